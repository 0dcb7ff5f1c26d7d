//! Behavior-driven tests for messaging-channel verification
//!
//! These tests follow a user from registration through the bot confirmation
//! to the polling page, and check that confirmation callbacks can neither be
//! replayed nor forged.

use std::collections::HashSet;
use std::sync::Arc;

use signalwatch_core::{
    AccountId, AccountStore, Candidate, ConfirmOutcome, ConfirmationCallback, ExternalChannelId,
    Field, MemoryAccountStore, PollOutcome, SessionGrant, TokenGenerator, ValidationError,
    VerificationConfig, VerificationError, VerificationFlow, VerificationToken,
};

fn candidate(email: &str, phone: &str) -> Candidate {
    Candidate {
        name: "Ada Lovelace".to_string(),
        email: email.to_string(),
        phone: phone.to_string(),
        password_hash: "$2y$12$precomputed".to_string(),
    }
}

fn flow_over(store: Arc<MemoryAccountStore>) -> VerificationFlow {
    VerificationFlow::new(
        VerificationConfig::default().with_bot_username("signals_bot"),
        store,
        TokenGenerator::new(),
    )
}

fn callback(token: &str, channel: &str) -> ConfirmationCallback {
    ConfirmationCallback {
        token: token.to_string(),
        channel_id: ExternalChannelId::new(channel),
    }
}

// =============================================================================
// Happy path
// =============================================================================

#[test]
fn user_registers_confirms_in_the_bot_and_is_logged_in() {
    // Given: A new visitor registering
    let store = Arc::new(MemoryAccountStore::new());
    let flow = flow_over(store.clone());

    // When: They submit the registration form
    let registration = flow
        .register(candidate("a@x.com", "+15551234567"))
        .expect("registration succeeds");

    // Then: A pending account exists with a w + 8 digit token
    let account = &registration.account;
    assert!(!account.is_verified());
    assert!(account.external_channel_id.is_none());
    let token = account
        .verification_token
        .clone()
        .expect("pending token assigned");
    assert!(VerificationToken::parse(token.as_str()).is_ok());

    // And: The bot link carries the static prefix and the token
    let link = registration.confirmation_link.as_str();
    assert!(link.starts_with("https://t.me/signals_bot?start=w48135207--"));
    assert!(link.ends_with(&format!("--{token}")));

    // And: Polling reports pending until the bot confirms
    assert_eq!(flow.poll(account.id).expect("known account"), PollOutcome::Pending);

    // When: The bot relays the token with the user's chat id
    let outcome = flow
        .confirm(callback(token.as_str(), "987654321"))
        .expect("callback handled");
    assert_eq!(outcome, ConfirmOutcome::Verified { account_id: account.id });

    // Then: Polling yields a remember-me grant redirecting home
    let expected = PollOutcome::Verified {
        grant: SessionGrant {
            account_id: account.id,
            remember: true,
            redirect: "/home".to_string(),
        },
    };
    assert_eq!(flow.poll(account.id).expect("known account"), expected);
    assert_eq!(flow.poll(account.id).expect("poll is repeatable"), expected);

    // And: The stored account holds the chat id and no token
    let stored = store.find(account.id).expect("memory store").expect("exists");
    assert!(stored.is_verified());
    assert_eq!(stored.external_channel_id, Some(ExternalChannelId::new("987654321")));
}

#[test]
fn registration_never_grants_a_session() {
    let flow = flow_over(Arc::new(MemoryAccountStore::new()));
    let registration = flow
        .register(candidate("b@x.com", "+15550000001"))
        .expect("registered");

    assert!(!flow
        .poll(registration.account.id)
        .expect("known account")
        .is_verified());
}

// =============================================================================
// Rejections
// =============================================================================

#[test]
fn invalid_fields_are_reported_together() {
    // Given: A form with every field wrong
    let store = Arc::new(MemoryAccountStore::new());
    let flow = flow_over(store.clone());
    let bad = Candidate {
        name: String::new(),
        email: "not an email".to_string(),
        phone: "555-CALL-NOW".to_string(),
        password_hash: "hash".to_string(),
    };

    // When: It is submitted
    let error = flow.register(bad).expect_err("validation must fail");

    // Then: One error per field comes back and nothing is stored
    let VerificationError::Invalid(errors) = error else {
        panic!("expected validation errors, got {error:?}");
    };
    let grouped = errors.by_field();
    assert!(grouped.contains_key("name"));
    assert!(grouped.contains_key("email"));
    assert!(grouped.contains_key("phone"));
    assert!(store.is_empty());
}

#[test]
fn already_registered_phone_is_rejected() {
    let flow = flow_over(Arc::new(MemoryAccountStore::new()));
    flow.register(candidate("first@x.com", "+15551234567"))
        .expect("first registration");

    let error = flow
        .register(candidate("second@x.com", "+15551234567"))
        .expect_err("phone is taken");

    let VerificationError::Invalid(errors) = error else {
        panic!("expected validation errors, got {error:?}");
    };
    assert_eq!(
        errors.errors(),
        &[ValidationError::AlreadyRegistered { field: Field::Phone }]
    );
}

#[test]
fn polling_an_unknown_account_is_not_found() {
    let flow = flow_over(Arc::new(MemoryAccountStore::new()));
    let missing = AccountId::new(999).expect("positive id");

    let error = flow.poll(missing).expect_err("unknown account");

    assert!(matches!(
        error,
        VerificationError::NotFound { account_id } if account_id == missing
    ));
}

// =============================================================================
// Callback safety
// =============================================================================

#[test]
fn forged_token_changes_nothing() {
    // Given: Two pending accounts
    let store = Arc::new(MemoryAccountStore::new());
    let flow = flow_over(store.clone());
    let issued: HashSet<String> = [("a@x.com", "+15551111111"), ("b@x.com", "+15552222222")]
        .into_iter()
        .map(|(email, phone)| {
            flow.register(candidate(email, phone))
                .expect("registered")
                .account
                .verification_token
                .expect("pending")
                .to_string()
        })
        .collect();
    let before = store.snapshot();

    // When: A callback arrives with a token nobody was issued
    let forged = ["w00000000", "w99999999", "w12345678"]
        .into_iter()
        .find(|token| !issued.contains(*token))
        .expect("at least one unissued token");
    let outcome = flow.confirm(callback(forged, "666")).expect("handled");

    // Then: It is ignored and no account changed
    assert_eq!(outcome, ConfirmOutcome::Ignored);
    assert_eq!(store.snapshot(), before);
}

#[test]
fn a_token_can_only_be_used_once() {
    // Given: An account confirmed by its rightful owner
    let store = Arc::new(MemoryAccountStore::new());
    let flow = flow_over(store.clone());
    let registration = flow
        .register(candidate("a@x.com", "+15551234567"))
        .expect("registered");
    let token = registration.account.verification_token.expect("pending");
    flow.confirm(callback(token.as_str(), "owner"))
        .expect("first confirmation");

    // When: Someone replays the same token from another chat
    let outcome = flow
        .confirm(callback(token.as_str(), "attacker"))
        .expect("replay handled");

    // Then: The replay is ignored and the owner's chat id is kept
    assert_eq!(outcome, ConfirmOutcome::Ignored);
    let stored = store
        .find(registration.account.id)
        .expect("memory store")
        .expect("exists");
    assert_eq!(stored.external_channel_id, Some(ExternalChannelId::new("owner")));
}

#[test]
fn confirming_one_account_leaves_others_pending() {
    // Given: Two pending accounts
    let store = Arc::new(MemoryAccountStore::new());
    let flow = flow_over(store.clone());
    let first = flow
        .register(candidate("a@x.com", "+15551111111"))
        .expect("first registered");
    let second = flow
        .register(candidate("b@x.com", "+15552222222"))
        .expect("second registered");
    let first_token = first.account.verification_token.clone().expect("pending");
    let second_token = second.account.verification_token.clone().expect("pending");

    // When: Only the first account's token arrives from the bot
    let outcome = flow
        .confirm(callback(first_token.as_str(), "owner-a"))
        .expect("callback handled");

    // Then: The first is verified and the second is untouched
    assert_eq!(
        outcome,
        ConfirmOutcome::Verified {
            account_id: first.account.id
        }
    );
    assert!(flow.poll(first.account.id).expect("known").is_verified());
    assert_eq!(
        flow.poll(second.account.id).expect("known account"),
        PollOutcome::Pending
    );
    assert!(store.token_pending(&second_token).expect("memory store"));
    assert_eq!(
        store
            .find(second.account.id)
            .expect("memory store")
            .expect("exists"),
        second.account
    );
}

#[test]
fn racing_confirmations_verify_exactly_once() {
    // Given: One pending account
    let store = Arc::new(MemoryAccountStore::new());
    let flow = Arc::new(flow_over(store.clone()));
    let registration = flow
        .register(candidate("a@x.com", "+15551234567"))
        .expect("registered");
    let token = registration
        .account
        .verification_token
        .expect("pending")
        .to_string();

    // When: Eight chats deliver the token at the same moment
    let outcomes: Vec<(String, ConfirmOutcome)> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|chat| {
                let flow = Arc::clone(&flow);
                let token = token.clone();
                scope.spawn(move || {
                    let channel = format!("chat-{chat}");
                    let outcome = flow
                        .confirm(callback(&token, &channel))
                        .expect("callback handled");
                    (channel, outcome)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("confirm thread"))
            .collect()
    });

    // Then: Exactly one wins and the stored chat id is the winner's
    let winners: Vec<&String> = outcomes
        .iter()
        .filter(|(_, outcome)| matches!(outcome, ConfirmOutcome::Verified { .. }))
        .map(|(channel, _)| channel)
        .collect();
    assert_eq!(winners.len(), 1, "exactly one confirmation applies");

    let stored = store
        .find(registration.account.id)
        .expect("memory store")
        .expect("exists");
    assert!(stored.is_verified());
    assert_eq!(
        stored.external_channel_id.as_ref().map(ExternalChannelId::as_str),
        Some(winners[0].as_str())
    );
}

// =============================================================================
// Token uniqueness
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn ten_thousand_concurrent_registrations_get_distinct_tokens() {
    // Given: One flow shared by every request handler
    let store = Arc::new(MemoryAccountStore::new());
    let flow = Arc::new(flow_over(store.clone()));

    // When: 10,000 registrations run concurrently
    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..10_000u32 {
        let flow = Arc::clone(&flow);
        tasks.spawn(async move {
            flow.register(candidate(&format!("user{i}@x.com"), &format!("+1555{i:07}")))
        });
    }

    let mut tokens = HashSet::new();
    while let Some(joined) = tasks.join_next().await {
        let registration = joined.expect("task").expect("registration succeeds");
        let token = registration.account.verification_token.expect("pending");
        assert!(tokens.insert(token), "token issued twice");
    }

    // Then: Every stored account carries its own token
    assert_eq!(tokens.len(), 10_000);
    assert_eq!(store.len(), 10_000);
    let stored: HashSet<_> = store
        .snapshot()
        .into_iter()
        .filter_map(|account| account.verification_token)
        .collect();
    assert_eq!(stored, tokens);
}
