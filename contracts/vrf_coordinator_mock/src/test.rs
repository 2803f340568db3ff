#![cfg(test)]

use super::*;
use soroban_sdk::{
    testutils::{Address as _, Ledger},
    vec, Address, BytesN, Env, Vec, U256,
};

use consumer::{RecordingConsumer, RecordingConsumerClient};

mod consumer {
    use soroban_sdk::{contract, contracterror, contractimpl, contracttype, Env, Vec, U256};

    #[contracttype]
    pub enum ConsumerKey {
        Reject,
        LastRequest,
        LastWords,
    }

    #[contracterror]
    #[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
    #[repr(u32)]
    pub enum ConsumerError {
        Rejected = 1,
    }

    /// Consumer that stores whatever it is given, or refuses when told to.
    #[contract]
    pub struct RecordingConsumer;

    #[contractimpl]
    impl RecordingConsumer {
        pub fn set_reject(env: Env, reject: bool) {
            env.storage().instance().set(&ConsumerKey::Reject, &reject);
        }

        pub fn fulfill_random_words(
            env: Env,
            request_id: u64,
            random_words: Vec<U256>,
        ) -> Result<(), ConsumerError> {
            let storage = env.storage().instance();
            storage.set(&ConsumerKey::LastRequest, &request_id);
            storage.set(&ConsumerKey::LastWords, &random_words);

            if storage.get(&ConsumerKey::Reject).unwrap_or(false) {
                return Err(ConsumerError::Rejected);
            }
            Ok(())
        }

        pub fn last_request(env: Env) -> Option<u64> {
            env.storage().instance().get(&ConsumerKey::LastRequest)
        }

        pub fn last_words(env: Env) -> Option<Vec<U256>> {
            env.storage().instance().get(&ConsumerKey::LastWords)
        }
    }
}

const BASE_FEE: i128 = 2_500_000;
const GAS_PRICE: i128 = 1;
const CALLBACK_GAS_LIMIT: u32 = 500_000;
const PAYMENT: i128 = BASE_FEE + GAS_PRICE * CALLBACK_GAS_LIMIT as i128;

fn setup_coordinator(env: &Env) -> (VrfCoordinatorMockClient, Address) {
    let admin = Address::generate(env);
    let contract_id = env.register_contract(None, VrfCoordinatorMock);
    let client = VrfCoordinatorMockClient::new(env, &contract_id);

    client.initialize(&admin, &BASE_FEE, &GAS_PRICE);

    (client, admin)
}

fn setup_consumer(env: &Env) -> RecordingConsumerClient {
    let contract_id = env.register_contract(None, RecordingConsumer);
    RecordingConsumerClient::new(env, &contract_id)
}

/// Funded subscription with `consumer` registered; returns its id.
fn funded_subscription(
    client: &VrfCoordinatorMockClient,
    owner: &Address,
    consumer: &Address,
    funds: i128,
) -> u64 {
    let sub_id = client.create_subscription(owner);
    client.fund_subscription(&sub_id, &funds);
    client.add_consumer(&sub_id, consumer);
    sub_id
}

fn key_hash(env: &Env) -> BytesN<32> {
    BytesN::from_array(env, &[9u8; 32])
}

#[test]
fn test_initialization() {
    let env = Env::default();
    env.mock_all_auths();

    let (client, admin) = setup_coordinator(&env);

    let config = client.get_config();
    assert_eq!(config.admin, admin);
    assert_eq!(config.base_fee, BASE_FEE);
    assert_eq!(config.gas_price, GAS_PRICE);

    let result = client.try_initialize(&admin, &BASE_FEE, &GAS_PRICE);
    assert_eq!(result, Err(Ok(Error::AlreadyInitialized)));
}

#[test]
fn test_subscription_lifecycle() {
    let env = Env::default();
    env.mock_all_auths();

    let (client, admin) = setup_coordinator(&env);
    let consumer = Address::generate(&env);

    let first = client.create_subscription(&admin);
    let second = client.create_subscription(&admin);
    assert_eq!(first, 1);
    assert_eq!(second, 2);

    assert_eq!(client.fund_subscription(&first, &1_000), 1_000);
    assert_eq!(client.fund_subscription(&first, &500), 1_500);

    client.add_consumer(&first, &consumer);
    // Adding twice is a no-op
    client.add_consumer(&first, &consumer);

    let subscription = client.get_subscription(&first);
    assert_eq!(subscription.owner, admin);
    assert_eq!(subscription.balance, 1_500);
    assert_eq!(subscription.req_count, 0);
    assert_eq!(subscription.consumers, vec![&env, consumer.clone()]);

    client.remove_consumer(&first, &consumer);
    assert_eq!(client.get_subscription(&first).consumers.len(), 0);
    assert_eq!(
        client.try_remove_consumer(&first, &consumer),
        Err(Ok(Error::InvalidConsumer))
    );

    assert_eq!(client.cancel_subscription(&first), 1_500);
    assert_eq!(client.try_get_subscription(&first), Err(Ok(Error::InvalidSubscription)));
}

#[test]
fn test_fund_subscription_validation() {
    let env = Env::default();
    env.mock_all_auths();

    let (client, admin) = setup_coordinator(&env);
    let sub_id = client.create_subscription(&admin);

    assert_eq!(client.try_fund_subscription(&sub_id, &0), Err(Ok(Error::InvalidAmount)));
    assert_eq!(client.try_fund_subscription(&99, &10), Err(Ok(Error::InvalidSubscription)));
}

#[test]
fn test_request_validation() {
    let env = Env::default();
    env.mock_all_auths();

    let (client, admin) = setup_coordinator(&env);
    let consumer = Address::generate(&env);
    let stranger = Address::generate(&env);
    let sub_id = funded_subscription(&client, &admin, &consumer, 10 * PAYMENT);
    let key_hash = key_hash(&env);

    assert_eq!(
        client.try_request_random_words(&key_hash, &99, &3, &CALLBACK_GAS_LIMIT, &1, &consumer),
        Err(Ok(Error::InvalidSubscription))
    );
    assert_eq!(
        client.try_request_random_words(&key_hash, &sub_id, &3, &CALLBACK_GAS_LIMIT, &1, &stranger),
        Err(Ok(Error::InvalidConsumer))
    );
    assert_eq!(
        client.try_request_random_words(
            &key_hash,
            &sub_id,
            &(MAX_REQUEST_CONFIRMATIONS + 1),
            &CALLBACK_GAS_LIMIT,
            &1,
            &consumer
        ),
        Err(Ok(Error::InvalidRequestConfirmations))
    );
    assert_eq!(
        client.try_request_random_words(&key_hash, &sub_id, &3, &CALLBACK_GAS_LIMIT, &0, &consumer),
        Err(Ok(Error::InvalidNumWords))
    );
    assert_eq!(
        client.try_request_random_words(
            &key_hash,
            &sub_id,
            &3,
            &CALLBACK_GAS_LIMIT,
            &(MAX_NUM_WORDS + 1),
            &consumer
        ),
        Err(Ok(Error::InvalidNumWords))
    );
}

#[test]
fn test_request_assigns_sequential_ids() {
    let env = Env::default();
    env.mock_all_auths();
    env.ledger().set_timestamp(4_200);

    let (client, admin) = setup_coordinator(&env);
    let consumer = Address::generate(&env);
    let sub_id = funded_subscription(&client, &admin, &consumer, 10 * PAYMENT);
    let key_hash = key_hash(&env);

    let first = client.request_random_words(&key_hash, &sub_id, &3, &CALLBACK_GAS_LIMIT, &1, &consumer);
    let second = client.request_random_words(&key_hash, &sub_id, &3, &CALLBACK_GAS_LIMIT, &2, &consumer);
    assert_eq!(first, 1);
    assert_eq!(second, 2);

    let request = client.get_request(&second).unwrap();
    assert_eq!(request.sub_id, sub_id);
    assert_eq!(request.consumer, consumer);
    assert_eq!(request.key_hash, key_hash);
    assert_eq!(request.num_words, 2);
    assert_eq!(request.requested_at, 4_200);

    assert_eq!(client.get_subscription(&sub_id).req_count, 2);
}

#[test]
fn test_fulfill_delivers_derived_words() {
    let env = Env::default();
    env.mock_all_auths();

    let (client, admin) = setup_coordinator(&env);
    let consumer = setup_consumer(&env);
    let sub_id = funded_subscription(&client, &admin, &consumer.address, 10 * PAYMENT);

    let request_id = client.request_random_words(
        &key_hash(&env),
        &sub_id,
        &3,
        &CALLBACK_GAS_LIMIT,
        &2,
        &consumer.address,
    );

    assert!(client.fulfill_random_words(&request_id, &consumer.address));

    assert_eq!(consumer.last_request(), Some(request_id));
    let words = consumer.last_words().unwrap();
    assert_eq!(words.len(), 2);
    assert_ne!(words.get(0), words.get(1));

    assert_eq!(client.get_request(&request_id), None);
    assert_eq!(client.get_subscription(&sub_id).balance, 9 * PAYMENT);
}

#[test]
fn test_fulfill_with_override_words() {
    let env = Env::default();
    env.mock_all_auths();

    let (client, admin) = setup_coordinator(&env);
    let consumer = setup_consumer(&env);
    let sub_id = funded_subscription(&client, &admin, &consumer.address, PAYMENT);

    let request_id = client.request_random_words(
        &key_hash(&env),
        &sub_id,
        &3,
        &CALLBACK_GAS_LIMIT,
        &1,
        &consumer.address,
    );

    let words: Vec<U256> = vec![&env, U256::from_u32(&env, 42)];
    assert!(client.fulfill_with_override(&request_id, &consumer.address, &words));
    assert_eq!(consumer.last_words(), Some(words));
    assert_eq!(client.get_subscription(&sub_id).balance, 0);
}

#[test]
fn test_fulfill_validation() {
    let env = Env::default();
    env.mock_all_auths();

    let (client, admin) = setup_coordinator(&env);
    let consumer = setup_consumer(&env);
    let other = Address::generate(&env);
    let sub_id = funded_subscription(&client, &admin, &consumer.address, 10 * PAYMENT);

    assert_eq!(
        client.try_fulfill_random_words(&1, &consumer.address),
        Err(Ok(Error::NonexistentRequest))
    );

    let request_id = client.request_random_words(
        &key_hash(&env),
        &sub_id,
        &3,
        &CALLBACK_GAS_LIMIT,
        &1,
        &consumer.address,
    );

    assert_eq!(
        client.try_fulfill_random_words(&request_id, &other),
        Err(Ok(Error::ConsumerMismatch))
    );

    let two_words = vec![&env, U256::from_u32(&env, 1), U256::from_u32(&env, 2)];
    assert_eq!(
        client.try_fulfill_with_override(&request_id, &consumer.address, &two_words),
        Err(Ok(Error::WrongNumWords))
    );

    // Nothing consumed by the rejected attempts
    assert!(client.get_request(&request_id).is_some());
    assert!(client.fulfill_random_words(&request_id, &consumer.address));
    assert_eq!(
        client.try_fulfill_random_words(&request_id, &consumer.address),
        Err(Ok(Error::NonexistentRequest))
    );
}

#[test]
fn test_fulfill_insufficient_balance() {
    let env = Env::default();
    env.mock_all_auths();

    let (client, admin) = setup_coordinator(&env);
    let consumer = setup_consumer(&env);
    let sub_id = funded_subscription(&client, &admin, &consumer.address, PAYMENT - 1);

    let request_id = client.request_random_words(
        &key_hash(&env),
        &sub_id,
        &3,
        &CALLBACK_GAS_LIMIT,
        &1,
        &consumer.address,
    );

    assert_eq!(
        client.try_fulfill_random_words(&request_id, &consumer.address),
        Err(Ok(Error::InsufficientBalance))
    );
    assert_eq!(consumer.last_request(), None);

    client.fund_subscription(&sub_id, &1);
    assert!(client.fulfill_random_words(&request_id, &consumer.address));
}

#[test]
fn test_fulfill_fee_overflow() {
    let env = Env::default();
    env.mock_all_auths();

    let admin = Address::generate(&env);
    let contract_id = env.register_contract(None, VrfCoordinatorMock);
    let client = VrfCoordinatorMockClient::new(&env, &contract_id);
    client.initialize(&admin, &i128::MAX, &i128::MAX);

    let consumer = setup_consumer(&env);
    let sub_id = funded_subscription(&client, &admin, &consumer.address, i128::MAX);
    let request_id = client.request_random_words(
        &key_hash(&env),
        &sub_id,
        &3,
        &CALLBACK_GAS_LIMIT,
        &1,
        &consumer.address,
    );

    assert_eq!(
        client.try_fulfill_random_words(&request_id, &consumer.address),
        Err(Ok(Error::InvalidAmount))
    );
    // Nothing was charged or consumed
    assert_eq!(client.get_subscription(&sub_id).balance, i128::MAX);
    assert!(client.get_request(&request_id).is_some());
    assert_eq!(consumer.last_request(), None);
}

#[test]
fn test_failing_consumer_reports_unsuccessful() {
    let env = Env::default();
    env.mock_all_auths();

    let (client, admin) = setup_coordinator(&env);
    let consumer = setup_consumer(&env);
    let sub_id = funded_subscription(&client, &admin, &consumer.address, 10 * PAYMENT);
    consumer.set_reject(&true);

    let request_id = client.request_random_words(
        &key_hash(&env),
        &sub_id,
        &3,
        &CALLBACK_GAS_LIMIT,
        &1,
        &consumer.address,
    );

    assert!(!client.fulfill_random_words(&request_id, &consumer.address));

    // Consumer writes were rolled back, the request is still spent
    assert_eq!(consumer.last_request(), None);
    assert_eq!(client.get_request(&request_id), None);
    assert_eq!(client.get_subscription(&sub_id).balance, 9 * PAYMENT);
}
