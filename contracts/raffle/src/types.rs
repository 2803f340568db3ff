use soroban_sdk::{contracterror, contracttype, Address, BytesN};

/// Lifecycle of the current round. The only legal transitions are
/// `Open -> Calculating` (upkeep) and `Calculating -> Open` (fulfillment).
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RaffleState {
    Open = 0,
    Calculating = 1,
}

/// Immutable raffle parameters, fixed at initialization.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RaffleConfig {
    pub admin: Address,
    /// Token entrance fees are paid in and the pot is paid out in
    pub token: Address,
    /// Randomness coordinator that issues request ids and calls back
    pub coordinator: Address,
    /// Coordinator key (gas lane) used for every request
    pub key_hash: BytesN<32>,
    pub subscription_id: u64,
    pub callback_gas_limit: u32,
    /// Minimum amount accepted by `enter`, in token base units
    pub entrance_fee: i128,
    /// Minimum round length in seconds
    pub interval: u64,
}

/// Snapshot of the upkeep predicate and the inputs it was computed from.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UpkeepStatus {
    pub needed: bool,
    pub state: RaffleState,
    pub num_players: u32,
    pub balance: i128,
    pub time_passed: u64,
}

#[contracttype]
pub enum DataKey {
    Config,
    State,
    Players,          // Vec<Address>
    Pot,              // i128
    LastTimestamp,    // u64
    PendingRequestId, // u64, absent while Open
    RecentWinner,     // Address
}

/// Raffle error codes.
///
/// Validation: `AlreadyInitialized`, `NotInitialized`, `InvalidConfig`,
/// `InsufficientFee`, `RoundNotOpen`, `PlayerIndexOutOfRange`.
/// Precondition: `UpkeepNotNeeded`.
/// Integrity: `UnknownRequest`, `EmptyPlayerList`, `MissingRandomWords`.
/// Payout: `PayoutFailed`.
#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    AlreadyInitialized = 1,
    NotInitialized = 2,
    InvalidConfig = 3,
    InsufficientFee = 4,
    RoundNotOpen = 5,
    UpkeepNotNeeded = 6,
    UnknownRequest = 7,
    EmptyPlayerList = 8,
    MissingRandomWords = 9,
    PayoutFailed = 10,
    PlayerIndexOutOfRange = 11,
}
