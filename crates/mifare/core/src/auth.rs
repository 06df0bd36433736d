//! Sector authentication
//!
//! Authentication is per sector and per key slot. Key A and key B are
//! independent: authenticating with one does not grant the rights of the
//! other, and moving to another sector always requires a new handshake.

use tracing::instrument;

use crate::key::{KeyType, MifareKey};
use crate::pcd::Pcd;
use crate::picc::CardIdentity;
use crate::sector::{BlockAddress, Sector};
use crate::status::StatusCode;

/// Authenticate `key_type` against `trailer_block`
///
/// On [`StatusCode::Ok`] block I/O inside the sector may proceed. Any other
/// status means no cryptographic session is established.
#[instrument(level = "debug", skip(pcd, key, identity), fields(uid = %identity.uid()))]
pub fn authenticate<P: Pcd + ?Sized>(
    pcd: &mut P,
    key_type: KeyType,
    trailer_block: BlockAddress,
    key: &MifareKey,
    identity: &CardIdentity,
) -> StatusCode {
    let status = pcd.authenticate(key_type, trailer_block, key, identity);
    status.trace("authenticate");
    status
}

/// Authenticate `key_type` against the trailer of `sector`
pub fn authenticate_sector<P: Pcd + ?Sized>(
    pcd: &mut P,
    key_type: KeyType,
    sector: Sector,
    key: &MifareKey,
    identity: &CardIdentity,
) -> StatusCode {
    authenticate(pcd, key_type, sector.trailer_block(), key, identity)
}
