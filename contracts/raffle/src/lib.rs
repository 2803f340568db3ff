#![no_std]

use soroban_sdk::{contract, contractimpl, log, symbol_short, token, Address, BytesN, Env, Vec, U256};

mod types;
mod vrf;

pub use types::{DataKey, Error, RaffleConfig, RaffleState, UpkeepStatus};
pub use vrf::{VrfCoordinator, VrfCoordinatorClient, NUM_WORDS, REQUEST_CONFIRMATIONS};

const LEDGER_THRESHOLD_INSTANCE: u32 = 518_400; // ~30 days @ 5s/ledger
const LEDGER_BUMP_INSTANCE: u32 = 1_036_800; // ~60 days @ 5s/ledger

/// Automated Raffle Contract
///
/// Players buy into the current round by paying at least the entrance fee.
/// Once `interval` seconds have passed since the round opened and the pot is
/// non-empty, any automation caller may trigger `perform_upkeep`, which locks
/// the round and asks the randomness coordinator for one random word. The
/// coordinator's callback (`fulfill_random_words`) is the only way a locked
/// round completes: it picks `players[word % players.len()]`, pays out the
/// whole pot and reopens the round.
///
/// # Round lifecycle
/// - `Open`: entries accepted, upkeep may fire
/// - `Calculating`: entries rejected, exactly one randomness request pending
///
/// A round whose request is never answered stays `Calculating`; there is no
/// timeout and no manual override.
#[contract]
pub struct RaffleContract;

#[contractimpl]
impl RaffleContract {
    // ───────────── INITIALIZATION ─────────────

    /// Configure the raffle and open the first round.
    ///
    /// # Arguments
    /// * `admin` - Deployer; must authorize the call
    /// * `token` - Token used for entrance fees and payout
    /// * `coordinator` - Randomness coordinator contract
    /// * `key_hash` - Coordinator gas lane
    /// * `subscription_id` - Funded coordinator subscription with this contract as consumer
    /// * `callback_gas_limit` - Gas budget the coordinator allows for the callback
    /// * `entrance_fee` - Minimum entry payment in token base units
    /// * `interval` - Minimum round length in seconds
    ///
    /// # Errors
    /// - `AlreadyInitialized`: configuration already stored
    /// - `InvalidConfig`: non-positive fee or zero interval
    #[allow(clippy::too_many_arguments)]
    pub fn initialize(
        env: Env,
        admin: Address,
        token: Address,
        coordinator: Address,
        key_hash: BytesN<32>,
        subscription_id: u64,
        callback_gas_limit: u32,
        entrance_fee: i128,
        interval: u64,
    ) -> Result<(), Error> {
        let storage = env.storage().instance();
        if storage.has(&DataKey::Config) {
            return Err(Error::AlreadyInitialized);
        }

        admin.require_auth();

        if entrance_fee <= 0 || interval == 0 {
            return Err(Error::InvalidConfig);
        }

        let config = RaffleConfig {
            admin,
            token,
            coordinator,
            key_hash,
            subscription_id,
            callback_gas_limit,
            entrance_fee,
            interval,
        };

        storage.set(&DataKey::Config, &config);
        storage.set(&DataKey::State, &RaffleState::Open);
        storage.set(&DataKey::Players, &Vec::<Address>::new(&env));
        storage.set(&DataKey::Pot, &0i128);
        storage.set(&DataKey::LastTimestamp, &env.ledger().timestamp());
        Self::bump_instance(&env);

        Ok(())
    }

    // ───────────── ENTRY LEDGER ─────────────

    /// Buy into the current round.
    ///
    /// The whole `amount` goes into the pot; anything above the entrance fee
    /// is kept, not refunded. The same player may enter any number of times.
    ///
    /// # Errors
    /// - `RoundNotOpen`: the round is waiting for randomness
    /// - `InsufficientFee`: `amount` is below the entrance fee
    pub fn enter(env: Env, player: Address, amount: i128) -> Result<(), Error> {
        let config = Self::load_config(&env)?;

        if Self::load_state(&env) != RaffleState::Open {
            return Err(Error::RoundNotOpen);
        }
        if amount < config.entrance_fee {
            return Err(Error::InsufficientFee);
        }

        player.require_auth();

        let token_client = token::Client::new(&env, &config.token);
        token_client.transfer(&player, &env.current_contract_address(), &amount);

        let storage = env.storage().instance();
        let mut players = Self::load_players(&env);
        players.push_back(player.clone());
        storage.set(&DataKey::Players, &players);

        let pot = Self::load_pot(&env) + amount;
        storage.set(&DataKey::Pot, &pot);
        Self::bump_instance(&env);

        env.events()
            .publish((symbol_short!("entered"), player), amount);

        Ok(())
    }

    // ───────────── UPKEEP MONITOR ─────────────

    /// Whether `perform_upkeep` would succeed right now. Read-only.
    ///
    /// True iff the round is open, at least `interval` seconds passed since
    /// it opened, it has players, and the pot is positive.
    pub fn check_upkeep(env: Env) -> bool {
        Self::upkeep_status(&env)
            .map(|status| status.needed)
            .unwrap_or(false)
    }

    /// `check_upkeep` together with the values it was derived from.
    pub fn get_upkeep_status(env: Env) -> Result<UpkeepStatus, Error> {
        Self::upkeep_status(&env)
    }

    /// Lock the round and request randomness for it.
    ///
    /// Callable by anyone. The upkeep predicate is evaluated again here, so a
    /// second call while `Calculating` fails and at most one request is ever
    /// outstanding.
    ///
    /// # Returns
    /// * `Ok(u64)` - Request id issued by the coordinator
    ///
    /// # Errors
    /// - `UpkeepNotNeeded`: predicate false; the diagnostics are logged
    pub fn perform_upkeep(env: Env) -> Result<u64, Error> {
        let config = Self::load_config(&env)?;
        let status = Self::upkeep_status(&env)?;

        if !status.needed {
            log!(
                &env,
                "upkeep not needed: balance, players, state",
                status.balance,
                status.num_players,
                status.state
            );
            return Err(Error::UpkeepNotNeeded);
        }

        let storage = env.storage().instance();
        storage.set(&DataKey::State, &RaffleState::Calculating);

        let coordinator = VrfCoordinatorClient::new(&env, &config.coordinator);
        let request_id = coordinator.request_random_words(
            &config.key_hash,
            &config.subscription_id,
            &REQUEST_CONFIRMATIONS,
            &config.callback_gas_limit,
            &NUM_WORDS,
            &env.current_contract_address(),
        );

        storage.set(&DataKey::PendingRequestId, &request_id);
        Self::bump_instance(&env);

        env.events()
            .publish((symbol_short!("rand_req"),), request_id);

        Ok(request_id)
    }

    // ───────────── RANDOMNESS COORDINATOR ─────────────

    /// Coordinator callback completing the pending round.
    ///
    /// Only `random_words[0]` is used. The winner is
    /// `players[random_words[0] % players.len()]`; the pot is paid to them,
    /// the players list cleared and the round reopened at the current time.
    /// If the payout transfer fails the whole call fails and nothing changes.
    ///
    /// # Errors
    /// - `UnknownRequest`: `request_id` is not the pending request
    /// - `MissingRandomWords`: no random word supplied
    /// - `EmptyPlayerList`: pending round has no players
    /// - `PayoutFailed`: token transfer to the winner was rejected
    pub fn fulfill_random_words(
        env: Env,
        request_id: u64,
        random_words: Vec<U256>,
    ) -> Result<(), Error> {
        let config = Self::load_config(&env)?;
        config.coordinator.require_auth();

        let storage = env.storage().instance();
        let pending: Option<u64> = storage.get(&DataKey::PendingRequestId);
        if pending != Some(request_id) {
            return Err(Error::UnknownRequest);
        }

        let random_word = random_words.get(0).ok_or(Error::MissingRandomWords)?;
        let players = Self::load_players(&env);
        if players.is_empty() {
            return Err(Error::EmptyPlayerList);
        }

        let winner = Self::pick_winner(&env, &players, &random_word)?;
        let payout = Self::load_pot(&env);

        storage.set(&DataKey::RecentWinner, &winner);
        storage.set(&DataKey::Players, &Vec::<Address>::new(&env));
        storage.set(&DataKey::Pot, &0i128);
        storage.set(&DataKey::State, &RaffleState::Open);
        storage.set(&DataKey::LastTimestamp, &env.ledger().timestamp());
        storage.remove(&DataKey::PendingRequestId);
        Self::bump_instance(&env);

        // A failed transfer rolls back every write above.
        let token_client = token::Client::new(&env, &config.token);
        let transfer = token_client.try_transfer(&env.current_contract_address(), &winner, &payout);
        if !matches!(transfer, Ok(Ok(()))) {
            log!(&env, "payout failed: amount, winner", payout, winner);
            return Err(Error::PayoutFailed);
        }

        env.events()
            .publish((symbol_short!("winner"), winner), (request_id, payout));

        Ok(())
    }

    // ───────────── VIEW FUNCTIONS ─────────────

    pub fn get_config(env: Env) -> Result<RaffleConfig, Error> {
        Self::load_config(&env)
    }

    pub fn get_entrance_fee(env: Env) -> Result<i128, Error> {
        Ok(Self::load_config(&env)?.entrance_fee)
    }

    pub fn get_interval(env: Env) -> Result<u64, Error> {
        Ok(Self::load_config(&env)?.interval)
    }

    /// Player at `index` in entry order.
    pub fn get_player(env: Env, index: u32) -> Result<Address, Error> {
        Self::load_players(&env)
            .get(index)
            .ok_or(Error::PlayerIndexOutOfRange)
    }

    pub fn get_players(env: Env) -> Vec<Address> {
        Self::load_players(&env)
    }

    pub fn get_num_players(env: Env) -> u32 {
        Self::load_players(&env).len()
    }

    pub fn get_last_timestamp(env: Env) -> Result<u64, Error> {
        env.storage()
            .instance()
            .get(&DataKey::LastTimestamp)
            .ok_or(Error::NotInitialized)
    }

    pub fn get_raffle_state(env: Env) -> Result<RaffleState, Error> {
        Self::load_config(&env)?;
        Ok(Self::load_state(&env))
    }

    /// Winner of the last completed round, if any.
    pub fn get_recent_winner(env: Env) -> Option<Address> {
        env.storage().instance().get(&DataKey::RecentWinner)
    }

    /// Request id the current round is waiting on; `None` while open.
    pub fn get_pending_request_id(env: Env) -> Option<u64> {
        env.storage().instance().get(&DataKey::PendingRequestId)
    }

    /// Pooled entrance fees awaiting payout.
    pub fn get_balance(env: Env) -> i128 {
        Self::load_pot(&env)
    }

    pub fn get_num_words(_env: Env) -> u32 {
        NUM_WORDS
    }

    pub fn get_request_confirmations(_env: Env) -> u32 {
        REQUEST_CONFIRMATIONS
    }

    // ───────────── INTERNAL HELPERS ─────────────

    fn upkeep_status(env: &Env) -> Result<UpkeepStatus, Error> {
        let config = Self::load_config(env)?;
        let state = Self::load_state(env);
        let num_players = Self::load_players(env).len();
        let balance = Self::load_pot(env);

        let last_timestamp: u64 = env
            .storage()
            .instance()
            .get(&DataKey::LastTimestamp)
            .ok_or(Error::NotInitialized)?;
        let time_passed = env.ledger().timestamp().saturating_sub(last_timestamp);

        let needed = state == RaffleState::Open
            && time_passed >= config.interval
            && num_players > 0
            && balance > 0;

        Ok(UpkeepStatus {
            needed,
            state,
            num_players,
            balance,
            time_passed,
        })
    }

    fn pick_winner(env: &Env, players: &Vec<Address>, random_word: &U256) -> Result<Address, Error> {
        let count = U256::from_u32(env, players.len());
        random_word
            .rem_euclid(&count)
            .to_u128()
            .and_then(|index| u32::try_from(index).ok())
            .and_then(|index| players.get(index))
            .ok_or(Error::EmptyPlayerList)
    }

    fn load_config(env: &Env) -> Result<RaffleConfig, Error> {
        env.storage()
            .instance()
            .get(&DataKey::Config)
            .ok_or(Error::NotInitialized)
    }

    fn load_state(env: &Env) -> RaffleState {
        env.storage()
            .instance()
            .get(&DataKey::State)
            .unwrap_or(RaffleState::Open)
    }

    fn load_players(env: &Env) -> Vec<Address> {
        env.storage()
            .instance()
            .get(&DataKey::Players)
            .unwrap_or(Vec::new(env))
    }

    fn load_pot(env: &Env) -> i128 {
        env.storage().instance().get(&DataKey::Pot).unwrap_or(0)
    }

    fn bump_instance(env: &Env) {
        env.storage()
            .instance()
            .extend_ttl(LEDGER_THRESHOLD_INSTANCE, LEDGER_BUMP_INSTANCE);
    }
}
