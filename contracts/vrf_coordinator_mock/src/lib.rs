#![no_std]

use soroban_sdk::{
    contract, contractclient, contractimpl, symbol_short, Address, Bytes, BytesN, Env, Vec, U256,
};

mod test;
mod types;

pub use types::{CoordinatorConfig, DataKey, Error, Request, Subscription};

pub const MAX_CONSUMERS: u32 = 100;
pub const MAX_REQUEST_CONFIRMATIONS: u32 = 200;
pub const MAX_NUM_WORDS: u32 = 500;

const LEDGER_THRESHOLD_SHARED: u32 = 518_400; // ~30 days @ 5s/ledger
const LEDGER_BUMP_SHARED: u32 = 1_036_800; // ~60 days @ 5s/ledger

/// Callback every consumer implements.
#[contractclient(name = "RandomnessConsumerClient")]
pub trait RandomnessConsumer {
    fn fulfill_random_words(env: Env, request_id: u64, random_words: Vec<U256>);
}

/// Development Randomness Coordinator
///
/// Stands in for a verifiable-randomness service on local networks. Consumers
/// draw on a prepaid subscription; each request gets a sequential id, and
/// whoever drives the test or local network later calls
/// `fulfill_random_words` to deliver the words back to the consumer.
///
/// # Fees
/// - Each fulfillment charges `base_fee + gas_price * callback_gas_limit`
///   from the request's subscription
/// - Funding only credits the subscription; no tokens move
#[contract]
pub struct VrfCoordinatorMock;

#[contractimpl]
impl VrfCoordinatorMock {
    pub fn initialize(env: Env, admin: Address, base_fee: i128, gas_price: i128) -> Result<(), Error> {
        let storage = env.storage().instance();
        if storage.has(&DataKey::Config) {
            return Err(Error::AlreadyInitialized);
        }

        admin.require_auth();

        if base_fee < 0 || gas_price < 0 {
            return Err(Error::InvalidAmount);
        }

        storage.set(&DataKey::Config, &CoordinatorConfig { admin, base_fee, gas_price });
        storage.set(&DataKey::NextSubId, &1u64);
        storage.set(&DataKey::NextRequestId, &1u64);

        Ok(())
    }

    // ───────────── SUBSCRIPTIONS ─────────────

    /// Open an empty subscription owned by `owner`.
    pub fn create_subscription(env: Env, owner: Address) -> Result<u64, Error> {
        Self::load_config(&env)?;
        owner.require_auth();

        let sub_id: u64 = env.storage().instance().get(&DataKey::NextSubId).unwrap_or(1);
        env.storage().instance().set(&DataKey::NextSubId, &(sub_id + 1));

        let subscription = Subscription {
            owner,
            balance: 0,
            req_count: 0,
            consumers: Vec::new(&env),
        };
        Self::save_subscription(&env, sub_id, &subscription);

        env.events().publish((symbol_short!("sub_new"), sub_id), subscription.owner);

        Ok(sub_id)
    }

    /// Credit `amount` to a subscription.
    pub fn fund_subscription(env: Env, sub_id: u64, amount: i128) -> Result<i128, Error> {
        if amount <= 0 {
            return Err(Error::InvalidAmount);
        }

        let mut subscription = Self::load_subscription(&env, sub_id)?;
        let old_balance = subscription.balance;
        subscription.balance += amount;
        Self::save_subscription(&env, sub_id, &subscription);

        env.events().publish(
            (symbol_short!("sub_fund"), sub_id),
            (old_balance, subscription.balance),
        );

        Ok(subscription.balance)
    }

    pub fn add_consumer(env: Env, sub_id: u64, consumer: Address) -> Result<(), Error> {
        let mut subscription = Self::load_subscription(&env, sub_id)?;
        subscription.owner.require_auth();

        if subscription.consumers.contains(&consumer) {
            return Ok(());
        }
        if subscription.consumers.len() >= MAX_CONSUMERS {
            return Err(Error::TooManyConsumers);
        }

        subscription.consumers.push_back(consumer.clone());
        Self::save_subscription(&env, sub_id, &subscription);

        env.events().publish((symbol_short!("con_add"), sub_id), consumer);
        Ok(())
    }

    pub fn remove_consumer(env: Env, sub_id: u64, consumer: Address) -> Result<(), Error> {
        let mut subscription = Self::load_subscription(&env, sub_id)?;
        subscription.owner.require_auth();

        let index = subscription
            .consumers
            .first_index_of(&consumer)
            .ok_or(Error::InvalidConsumer)?;
        subscription.consumers.remove(index);
        Self::save_subscription(&env, sub_id, &subscription);

        env.events().publish((symbol_short!("con_rm"), sub_id), consumer);
        Ok(())
    }

    /// Delete a subscription. Returns the balance it held.
    pub fn cancel_subscription(env: Env, sub_id: u64) -> Result<i128, Error> {
        let subscription = Self::load_subscription(&env, sub_id)?;
        subscription.owner.require_auth();

        env.storage().persistent().remove(&DataKey::Subscription(sub_id));

        env.events().publish(
            (symbol_short!("sub_end"), sub_id),
            (subscription.owner, subscription.balance),
        );

        Ok(subscription.balance)
    }

    // ───────────── REQUESTS ─────────────

    /// Record a randomness request for `consumer` and return its id.
    ///
    /// # Errors
    /// - `InvalidSubscription`: unknown `sub_id`
    /// - `InvalidConsumer`: `consumer` is not registered on the subscription
    /// - `InvalidRequestConfirmations`: more than `MAX_REQUEST_CONFIRMATIONS`
    /// - `InvalidNumWords`: zero or more than `MAX_NUM_WORDS`
    pub fn request_random_words(
        env: Env,
        key_hash: BytesN<32>,
        sub_id: u64,
        minimum_request_confirmations: u32,
        callback_gas_limit: u32,
        num_words: u32,
        consumer: Address,
    ) -> Result<u64, Error> {
        consumer.require_auth();

        let mut subscription = Self::load_subscription(&env, sub_id)?;
        if !subscription.consumers.contains(&consumer) {
            return Err(Error::InvalidConsumer);
        }
        if minimum_request_confirmations > MAX_REQUEST_CONFIRMATIONS {
            return Err(Error::InvalidRequestConfirmations);
        }
        if num_words == 0 || num_words > MAX_NUM_WORDS {
            return Err(Error::InvalidNumWords);
        }

        let storage = env.storage().instance();
        let request_id: u64 = storage.get(&DataKey::NextRequestId).unwrap_or(1);
        storage.set(&DataKey::NextRequestId, &(request_id + 1));

        let request = Request {
            sub_id,
            consumer: consumer.clone(),
            key_hash,
            minimum_request_confirmations,
            callback_gas_limit,
            num_words,
            requested_at: env.ledger().timestamp(),
        };
        let key = DataKey::Request(request_id);
        env.storage().persistent().set(&key, &request);
        Self::bump_persistent_ttl(&env, &key);

        subscription.req_count += 1;
        Self::save_subscription(&env, sub_id, &subscription);

        env.events()
            .publish((symbol_short!("rw_req"), consumer), (request_id, sub_id));

        Ok(request_id)
    }

    /// Answer a request with words derived from its id.
    pub fn fulfill_random_words(env: Env, request_id: u64, consumer: Address) -> Result<bool, Error> {
        let request = Self::load_request(&env, request_id)?;
        let words = Self::derive_words(&env, request_id, request.num_words);
        Self::fulfill_with_override(env, request_id, consumer, words)
    }

    /// Answer a request with caller-chosen words.
    ///
    /// The request is consumed and the subscription charged whether or not
    /// the consumer's callback succeeds.
    ///
    /// # Returns
    /// * `Ok(true)` - Consumer accepted the words
    /// * `Ok(false)` - Consumer callback failed; its changes were rolled back
    ///
    /// # Errors
    /// - `InvalidAmount`: the fee overflows `i128`
    pub fn fulfill_with_override(
        env: Env,
        request_id: u64,
        consumer: Address,
        words: Vec<U256>,
    ) -> Result<bool, Error> {
        let config = Self::load_config(&env)?;
        let request = Self::load_request(&env, request_id)?;

        if request.consumer != consumer {
            return Err(Error::ConsumerMismatch);
        }
        if words.len() != request.num_words {
            return Err(Error::WrongNumWords);
        }

        let payment = config
            .gas_price
            .checked_mul(request.callback_gas_limit as i128)
            .and_then(|gas| gas.checked_add(config.base_fee))
            .ok_or(Error::InvalidAmount)?;
        let mut subscription = Self::load_subscription(&env, request.sub_id)?;
        if subscription.balance < payment {
            return Err(Error::InsufficientBalance);
        }
        subscription.balance -= payment;
        Self::save_subscription(&env, request.sub_id, &subscription);
        env.storage().persistent().remove(&DataKey::Request(request_id));

        let consumer_client = RandomnessConsumerClient::new(&env, &consumer);
        let success = matches!(
            consumer_client.try_fulfill_random_words(&request_id, &words),
            Ok(Ok(()))
        );

        env.events()
            .publish((symbol_short!("rw_ful"), request_id), (payment, success));

        Ok(success)
    }

    // ───────────── VIEW FUNCTIONS ─────────────

    pub fn get_config(env: Env) -> Result<CoordinatorConfig, Error> {
        Self::load_config(&env)
    }

    pub fn get_subscription(env: Env, sub_id: u64) -> Result<Subscription, Error> {
        Self::load_subscription(&env, sub_id)
    }

    pub fn get_request(env: Env, request_id: u64) -> Option<Request> {
        env.storage().persistent().get(&DataKey::Request(request_id))
    }

    // ───────────── INTERNAL HELPERS ─────────────

    // word[i] = sha256(request_id_be || i_be) as a big-endian U256
    fn derive_words(env: &Env, request_id: u64, num_words: u32) -> Vec<U256> {
        let mut words = Vec::new(env);
        for index in 0..num_words {
            let mut seed = [0u8; 12];
            seed[..8].copy_from_slice(&request_id.to_be_bytes());
            seed[8..].copy_from_slice(&index.to_be_bytes());

            let digest: BytesN<32> = env.crypto().sha256(&Bytes::from_array(env, &seed)).into();
            words.push_back(U256::from_be_bytes(env, &Bytes::from(digest)));
        }
        words
    }

    fn load_config(env: &Env) -> Result<CoordinatorConfig, Error> {
        env.storage()
            .instance()
            .get(&DataKey::Config)
            .ok_or(Error::NotInitialized)
    }

    fn load_subscription(env: &Env, sub_id: u64) -> Result<Subscription, Error> {
        env.storage()
            .persistent()
            .get(&DataKey::Subscription(sub_id))
            .ok_or(Error::InvalidSubscription)
    }

    fn save_subscription(env: &Env, sub_id: u64, subscription: &Subscription) {
        let key = DataKey::Subscription(sub_id);
        env.storage().persistent().set(&key, subscription);
        Self::bump_persistent_ttl(env, &key);
    }

    fn load_request(env: &Env, request_id: u64) -> Result<Request, Error> {
        env.storage()
            .persistent()
            .get(&DataKey::Request(request_id))
            .ok_or(Error::NonexistentRequest)
    }

    fn bump_persistent_ttl(env: &Env, key: &DataKey) {
        env.storage()
            .persistent()
            .extend_ttl(key, LEDGER_THRESHOLD_SHARED, LEDGER_BUMP_SHARED);
    }
}
