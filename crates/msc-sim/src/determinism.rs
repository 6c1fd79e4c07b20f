use msc_core::derive_substream_seed;

/// Derives the deterministic seed the simulation driver draws from.
pub fn driver_seed(master_seed: u64) -> u64 {
    derive_substream_seed(master_seed, 0)
}

/// Derives the deterministic seed for a logger that draws its own samples.
///
/// Loggers that resimulate parts of the model must not disturb the driver
/// stream, otherwise enabling a logger would change the sampled states.
pub fn logger_seed(master_seed: u64, logger_slot: usize) -> u64 {
    derive_substream_seed(master_seed ^ 0x5C5C_5C5C_5C5C_5C5C, logger_slot as u64)
}
