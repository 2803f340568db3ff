use soroban_sdk::{contractclient, Address, BytesN, Env};

/// Minimum confirmations the coordinator waits before answering.
pub const REQUEST_CONFIRMATIONS: u32 = 3;
/// Random words requested per round; only the first one is consumed.
pub const NUM_WORDS: u32 = 1;

/// Outbound half of the randomness protocol. The coordinator answers later
/// by invoking `fulfill_random_words` on the consumer with the id returned
/// here.
#[contractclient(name = "VrfCoordinatorClient")]
pub trait VrfCoordinator {
    fn request_random_words(
        env: Env,
        key_hash: BytesN<32>,
        sub_id: u64,
        minimum_request_confirmations: u32,
        callback_gas_limit: u32,
        num_words: u32,
        consumer: Address,
    ) -> u64;
}
