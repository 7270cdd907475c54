pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const DEFAULT_DIFFICULTY: u32 = 4;
pub const MAX_DIFFICULTY: u32 = HASH_HEX_SIZE as u32;
/// How many nonces the miner tries between looks at its cancel flag and deadline.
pub const CANCEL_CHECK_INTERVAL: u64 = 4096;
pub const GENESIS_PREVIOUS_HASH: &str = "";
pub const GENESIS_DATA: &str = "Genesis Block";
pub const DEFAULT_CHAIN_FILE: &str = "blockchain_transactions.json";
