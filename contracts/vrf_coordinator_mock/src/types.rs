use soroban_sdk::{contracterror, contracttype, Address, BytesN, Vec};

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CoordinatorConfig {
    pub admin: Address,
    /// Flat premium charged per fulfilled request
    pub base_fee: i128,
    /// Charged per unit of the request's callback gas limit
    pub gas_price: i128,
}

/// Prepaid account that consumers draw on when their requests are answered.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Subscription {
    pub owner: Address,
    pub balance: i128,
    pub req_count: u64,
    pub consumers: Vec<Address>,
}

/// A request waiting for fulfillment.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Request {
    pub sub_id: u64,
    pub consumer: Address,
    pub key_hash: BytesN<32>,
    pub minimum_request_confirmations: u32,
    pub callback_gas_limit: u32,
    pub num_words: u32,
    pub requested_at: u64, // ledger timestamp (seconds)
}

#[contracttype]
pub enum DataKey {
    Config,
    NextSubId,
    NextRequestId,
    Subscription(u64),
    Request(u64),
}

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    AlreadyInitialized = 1,
    NotInitialized = 2,
    InvalidAmount = 3,
    InvalidSubscription = 4,
    InvalidConsumer = 5,
    TooManyConsumers = 6,
    InvalidRequestConfirmations = 7,
    InvalidNumWords = 8,
    NonexistentRequest = 9,
    ConsumerMismatch = 10,
    WrongNumWords = 11,
    InsufficientBalance = 12,
}
