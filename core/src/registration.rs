//! User registration and the referral link.
//!
//! A new user gets a random 8-character referral code. Signing up with
//! someone else's code records them as `referred_by` and bumps their
//! referral_count; that link is what commission crediting later walks.

use crate::{
    coordinator::TransactionCoordinator,
    error::{LedgerError, LedgerResult},
    event::{LedgerEvent, NewActivity},
    model::User,
    store::LedgerTx,
};
use chrono::{DateTime, Utc};
use rand::Rng;

const CODE_ATTEMPTS: usize = 8;

/// 8 upper-case hex characters.
pub fn generate_referral_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{:08X}", rng.gen::<u32>())
}

pub fn register_user(
    coordinator: &mut TransactionCoordinator,
    referral_code: Option<&str>,
    now: DateTime<Utc>,
) -> LedgerResult<User> {
    let referral_code = referral_code.map(|c| c.trim().to_ascii_uppercase());

    let user = coordinator.run("register_user", |tx| {
        let referred_by = match referral_code.as_deref() {
            Some(code) => {
                let referrer = tx.user_id_by_referral_code(code)?;
                if referrer.is_none() {
                    log::warn!("registration with unknown referral code '{code}', ignoring");
                }
                referrer
            }
            None => None,
        };

        let code = unused_code(tx)?;
        let user = tx.insert_user(&code, referred_by, now)?;
        if let Some(referrer) = referred_by {
            tx.increment_referral_count(referrer)?;
        }

        let event = LedgerEvent::UserRegistered {
            user_id: user.id,
            referred_by,
        };
        tx.append_activity(
            &NewActivity {
                user_id: user.id,
                event: &event,
                idempotency_key: None,
                entity_id: Some(user.id),
            },
            now,
        )?;
        Ok(user)
    })?;

    log::info!(
        "user registered: id={} code={} referred_by={:?}",
        user.id,
        user.referral_code,
        user.referred_by
    );
    Ok(user)
}

fn unused_code(tx: &LedgerTx<'_>) -> LedgerResult<String> {
    let mut rng = rand::thread_rng();
    for _ in 0..CODE_ATTEMPTS {
        let code = generate_referral_code(&mut rng);
        if !tx.referral_code_taken(&code)? {
            return Ok(code);
        }
    }
    Err(LedgerError::Other(anyhow::anyhow!(
        "no free referral code after {CODE_ATTEMPTS} attempts"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn referral_code_is_eight_upper_hex() {
        let mut rng = rand::thread_rng();
        for _ in 0..32 {
            let code = generate_referral_code(&mut rng);
            assert_eq!(code.len(), 8);
            assert!(code
                .chars()
                .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
        }
    }
}
