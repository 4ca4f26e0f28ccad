//! `barebone user-id` handler.

use barebone_config::TrackerConfig;
use barebone_core::IdentityProvider;

use crate::store::open_store;

/// Print the persisted user id, creating it on first use.
pub(crate) fn handle_user_id(config: &TrackerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let identity = IdentityProvider::new(open_store(config));
    println!("{}", identity.get_user_id());
    Ok(())
}
