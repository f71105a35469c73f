//! Organization-level state.
//!
//! A DAO record is created on the first scheme registration seen for an
//! avatar, together with shadow records of its native token and reputation
//! contracts. Reputation holders may be recorded before the DAO is known;
//! they are attached to it at creation time.
//!
//! Membership count follows holder balances under the DAO's reputation
//! contract: +1 when a balance turns non-zero, -1 when it returns to zero.
//! Zero-balance holders are deleted.

use crate::chain::{ChainReader, VersionRegistry};
use crate::store::{Entity, EntityKind, EntityStore, EntityStoreExt, StoreResult};
use crate::types::{compound_id, Address, Amount, Bytes32};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dao {
    /// Avatar address.
    pub id: Address,
    pub name: String,
    pub controller: Address,
    /// Contract version tag used to read the organization.
    pub version: String,
    pub native_token: Address,
    pub native_reputation: Address,
    pub reputation_holders_count: u64,
    pub registered_at: u64,
    /// Non-fatal read failures seen while processing this DAO's events.
    #[serde(default)]
    pub read_failures: Vec<String>,
}

impl Entity for Dao {
    const KIND: EntityKind = EntityKind::Dao;

    fn entity_id(&self) -> String {
        self.id.to_string()
    }
}

/// A scheme's registration with a DAO's controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerScheme {
    pub dao: Address,
    pub scheme: Address,
    pub params_hash: Bytes32,
    pub registered: bool,
    pub registered_at: u64,
    pub unregistered_at: Option<u64>,
}

impl Entity for ControllerScheme {
    const KIND: EntityKind = EntityKind::ControllerScheme;

    fn entity_id(&self) -> String {
        compound_id(&[&self.dao, &self.scheme])
    }
}

/// Shadow of a native token contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub address: Address,
    pub dao: Option<Address>,
    pub name: String,
    pub symbol: String,
    pub total_supply: Amount,
}

impl Entity for Token {
    const KIND: EntityKind = EntityKind::Token;

    fn entity_id(&self) -> String {
        self.address.to_string()
    }
}

/// Shadow of a reputation contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reputation {
    pub address: Address,
    pub dao: Option<Address>,
    pub total_supply: Amount,
}

impl Entity for Reputation {
    const KIND: EntityKind = EntityKind::Reputation;

    fn entity_id(&self) -> String {
        self.address.to_string()
    }
}

/// Non-zero reputation balance of one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationHolder {
    pub contract: Address,
    pub address: Address,
    /// Unset until the owning DAO is registered.
    pub dao: Option<Address>,
    pub balance: Amount,
    pub created_at: u64,
}

impl Entity for ReputationHolder {
    const KIND: EntityKind = EntityKind::ReputationHolder;

    fn entity_id(&self) -> String {
        compound_id(&[&self.contract, &self.address])
    }
}

/// Holders of one reputation contract, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolderIndex {
    pub contract: Address,
    pub holders: Vec<Address>,
}

impl Entity for HolderIndex {
    const KIND: EntityKind = EntityKind::HolderIndex;

    fn entity_id(&self) -> String {
        self.contract.to_string()
    }
}

/// What a balance refresh did to a holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HolderChange {
    Joined { dao: Option<Address> },
    Left,
    Updated,
}

/// Inputs of a `RegisterScheme` event.
#[derive(Debug, Clone, Copy)]
pub struct SchemeRegistration {
    pub controller: Address,
    pub avatar: Address,
    pub scheme: Address,
    pub params_hash: Bytes32,
    pub timestamp: u64,
}

pub fn is_scheme_registered(
    store: &dyn EntityStore,
    dao: &Address,
    scheme: &Address,
) -> StoreResult<bool> {
    Ok(store
        .load::<ControllerScheme>(&compound_id(&[dao, scheme]))?
        .is_some_and(|s| s.registered))
}

/// Attach a failure marker to `dao`, once.
pub fn record_read_failure(
    store: &mut dyn EntityStore,
    dao: &Address,
    marker: String,
) -> StoreResult<()> {
    let Some(mut record) = store.load::<Dao>(&dao.to_string())? else {
        tracing::warn!(dao = %dao, marker, "read failure for unregistered dao");
        return Ok(());
    };
    if !record.read_failures.contains(&marker) {
        record.read_failures.push(marker);
        store.save(&record)?;
    }
    Ok(())
}

/// Handle `RegisterScheme`. Creates the DAO on its first registration and
/// returns it in that case.
pub fn register_scheme(
    store: &mut dyn EntityStore,
    chain: &dyn ChainReader,
    versions: &VersionRegistry,
    registration: &SchemeRegistration,
) -> StoreResult<Option<Dao>> {
    let id = compound_id(&[&registration.avatar, &registration.scheme]);
    let scheme = match store.load::<ControllerScheme>(&id)? {
        Some(mut existing) if existing.registered => {
            existing.params_hash = registration.params_hash;
            existing
        }
        Some(mut existing) => {
            existing.params_hash = registration.params_hash;
            existing.registered = true;
            existing.registered_at = registration.timestamp;
            existing.unregistered_at = None;
            existing
        }
        None => ControllerScheme {
            dao: registration.avatar,
            scheme: registration.scheme,
            params_hash: registration.params_hash,
            registered: true,
            registered_at: registration.timestamp,
            unregistered_at: None,
        },
    };
    store.save(&scheme)?;

    if store.exists::<Dao>(&registration.avatar.to_string())? {
        return Ok(None);
    }
    let dao = create_dao(store, chain, versions, registration)?;
    Ok(Some(dao))
}

pub fn unregister_scheme(
    store: &mut dyn EntityStore,
    avatar: &Address,
    scheme: &Address,
    timestamp: u64,
) -> StoreResult<bool> {
    let Some(mut record) = store.load::<ControllerScheme>(&compound_id(&[avatar, scheme]))? else {
        tracing::debug!(dao = %avatar, scheme = %scheme, "unregistering unknown scheme");
        return Ok(false);
    };
    if !record.registered {
        return Ok(false);
    }
    record.registered = false;
    record.unregistered_at = Some(timestamp);
    store.save(&record)?;
    Ok(true)
}

fn create_dao(
    store: &mut dyn EntityStore,
    chain: &dyn ChainReader,
    versions: &VersionRegistry,
    registration: &SchemeRegistration,
) -> StoreResult<Dao> {
    let avatar = registration.avatar;
    let version = versions.lookup(&registration.controller);
    let mut read_failures = Vec::new();

    let info = chain.organization(version, avatar).unwrap_or_else(|e| {
        tracing::warn!(dao = %avatar, version = %version, error = %e, "organization read failed");
        read_failures.push(format!("organization({}): {}", avatar, e));
        Default::default()
    });

    if !info.native_token.is_zero() {
        let token = match chain.token_info(version, info.native_token) {
            Ok(t) => Token {
                address: info.native_token,
                dao: Some(avatar),
                name: t.name,
                symbol: t.symbol,
                total_supply: t.total_supply,
            },
            Err(e) => {
                tracing::warn!(token = %info.native_token, error = %e, "token read failed");
                read_failures.push(format!("token_info({}): {}", info.native_token, e));
                Token {
                    address: info.native_token,
                    dao: Some(avatar),
                    name: String::new(),
                    symbol: String::new(),
                    total_supply: Amount::zero(),
                }
            }
        };
        store.save(&token)?;
    }

    let mut holders_count = 0;
    if !info.native_reputation.is_zero() {
        let mut reputation = store
            .load::<Reputation>(&info.native_reputation.to_string())?
            .unwrap_or_else(|| Reputation {
                address: info.native_reputation,
                dao: None,
                total_supply: Amount::zero(),
            });
        reputation.dao = Some(avatar);
        match chain.total_supply(info.native_reputation) {
            Ok(supply) => reputation.total_supply = supply,
            Err(e) => {
                tracing::warn!(reputation = %info.native_reputation, error = %e, "reputation supply read failed");
                read_failures.push(format!("total_supply({}): {}", info.native_reputation, e));
            }
        }
        store.save(&reputation)?;
        holders_count = backfill_holders(store, &info.native_reputation, &avatar)?;
    }

    let dao = Dao {
        id: avatar,
        name: info.name,
        controller: registration.controller,
        version: version.tag().to_string(),
        native_token: info.native_token,
        native_reputation: info.native_reputation,
        reputation_holders_count: holders_count,
        registered_at: registration.timestamp,
        read_failures,
    };
    store.save(&dao)?;
    tracing::info!(
        dao = %avatar,
        name = %dao.name,
        version = %dao.version,
        holders = holders_count,
        "new dao"
    );
    Ok(dao)
}

/// Attach holders recorded before the DAO existed. Returns how many were
/// attached.
fn backfill_holders(
    store: &mut dyn EntityStore,
    contract: &Address,
    dao: &Address,
) -> StoreResult<u64> {
    let Some(index) = store.load::<HolderIndex>(&contract.to_string())? else {
        return Ok(0);
    };
    let mut attached = 0;
    for account in &index.holders {
        let Some(mut holder) =
            store.load::<ReputationHolder>(&compound_id(&[contract, account]))?
        else {
            continue;
        };
        if holder.balance.is_zero() || holder.dao.is_some() {
            continue;
        }
        holder.dao = Some(*dao);
        store.save(&holder)?;
        attached += 1;
    }
    if attached > 0 {
        tracing::debug!(dao = %dao, attached, "backfilled reputation holders");
    }
    Ok(attached)
}

fn adjust_membership(store: &mut dyn EntityStore, dao: &Address, joined: bool) -> StoreResult<()> {
    let Some(mut record) = store.load::<Dao>(&dao.to_string())? else {
        return Ok(());
    };
    record.reputation_holders_count = if joined {
        record.reputation_holders_count + 1
    } else {
        record.reputation_holders_count.saturating_sub(1)
    };
    store.save(&record)
}

fn update_index(
    store: &mut dyn EntityStore,
    contract: &Address,
    account: &Address,
    present: bool,
) -> StoreResult<()> {
    let mut index = store
        .load::<HolderIndex>(&contract.to_string())?
        .unwrap_or_else(|| HolderIndex {
            contract: *contract,
            holders: Vec::new(),
        });
    let contains = index.holders.contains(account);
    if present && !contains {
        index.holders.push(*account);
    } else if !present && contains {
        index.holders.retain(|a| a != account);
    } else {
        return Ok(());
    }
    store.save(&index)
}

/// Refresh `account`'s balance on a reputation contract after a mint or
/// burn. A failed balance read skips the update.
pub fn apply_reputation_change(
    store: &mut dyn EntityStore,
    chain: &dyn ChainReader,
    contract: &Address,
    account: &Address,
    timestamp: u64,
) -> StoreResult<Option<HolderChange>> {
    let balance = match chain.balance_of(*contract, *account) {
        Ok(balance) => balance,
        Err(e) => {
            tracing::warn!(reputation = %contract, account = %account, error = %e, "balance read failed");
            return Ok(None);
        }
    };

    let mut reputation = store
        .load::<Reputation>(&contract.to_string())?
        .unwrap_or_else(|| Reputation {
            address: *contract,
            dao: None,
            total_supply: Amount::zero(),
        });
    match chain.total_supply(*contract) {
        Ok(supply) => reputation.total_supply = supply,
        Err(e) => tracing::warn!(reputation = %contract, error = %e, "reputation supply read failed"),
    }
    store.save(&reputation)?;

    let id = compound_id(&[contract, account]);
    let change = match (store.load::<ReputationHolder>(&id)?, balance.is_zero()) {
        (None, true) => return Ok(None),
        (None, false) => {
            store.save(&ReputationHolder {
                contract: *contract,
                address: *account,
                dao: reputation.dao,
                balance,
                created_at: timestamp,
            })?;
            update_index(store, contract, account, true)?;
            if let Some(dao) = &reputation.dao {
                adjust_membership(store, dao, true)?;
            }
            HolderChange::Joined {
                dao: reputation.dao,
            }
        }
        (Some(mut holder), false) => {
            if holder.balance == balance {
                return Ok(None);
            }
            holder.balance = balance;
            store.save(&holder)?;
            HolderChange::Updated
        }
        (Some(holder), true) => {
            store.remove::<ReputationHolder>(&id)?;
            update_index(store, contract, account, false)?;
            if let Some(dao) = &holder.dao {
                adjust_membership(store, dao, false)?;
            }
            HolderChange::Left
        }
    };
    Ok(Some(change))
}

/// Refresh a tracked token's supply on mint-like or burn-like transfers.
pub fn apply_token_transfer(
    store: &mut dyn EntityStore,
    chain: &dyn ChainReader,
    token: &Address,
    from: &Address,
    to: &Address,
) -> StoreResult<bool> {
    if !from.is_zero() && !to.is_zero() {
        return Ok(false);
    }
    let Some(mut record) = store.load::<Token>(&token.to_string())? else {
        return Ok(false);
    };
    match chain.total_supply(*token) {
        Ok(supply) if supply != record.total_supply => {
            record.total_supply = supply;
            store.save(&record)?;
            Ok(true)
        }
        Ok(_) => Ok(false),
        Err(e) => {
            tracing::warn!(token = %token, error = %e, "token supply read failed");
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ContractVersion, OrganizationInfo, RecordedChain, TokenInfo, VersionEntry};
    use crate::store::MemoryStore;
    use std::collections::BTreeSet;

    const CONTROLLER: Address = Address::repeat(0xc0);
    const AVATAR: Address = Address::repeat(0xa0);
    const TOKEN: Address = Address::repeat(0x70);
    const REP: Address = Address::repeat(0x80);
    const SCHEME: Address = Address::repeat(0x5c);

    fn chain() -> RecordedChain {
        let chain = RecordedChain::new();
        chain.put_organization(
            AVATAR,
            OrganizationInfo {
                name: "Genesis".to_string(),
                native_token: TOKEN,
                native_reputation: REP,
            },
        );
        chain.put_token_info(
            TOKEN,
            TokenInfo {
                name: "Gen".to_string(),
                symbol: "GEN".to_string(),
                total_supply: Amount::from(1000),
            },
        );
        chain.put_total_supply(REP, Amount::from(300));
        chain
    }

    fn registration(ts: u64) -> SchemeRegistration {
        SchemeRegistration {
            controller: CONTROLLER,
            avatar: AVATAR,
            scheme: SCHEME,
            params_hash: Bytes32::repeat(1),
            timestamp: ts,
        }
    }

    fn dao(store: &MemoryStore) -> Dao {
        store.load(&AVATAR.to_string()).unwrap().unwrap()
    }

    #[test]
    fn test_first_registration_creates_dao() {
        let mut store = MemoryStore::new();
        let chain = chain();
        let versions = VersionRegistry::default();

        let created = register_scheme(&mut store, &chain, &versions, &registration(10)).unwrap();
        let created = created.unwrap();
        assert_eq!(created.name, "Genesis");
        assert_eq!(created.version, versions.default_version().tag());
        assert!(is_scheme_registered(&store, &AVATAR, &SCHEME).unwrap());

        let token: Token = store.load(&TOKEN.to_string()).unwrap().unwrap();
        assert_eq!(token.symbol, "GEN");
        assert_eq!(token.dao, Some(AVATAR));

        // Second registration keeps the DAO.
        let other = SchemeRegistration {
            scheme: Address::repeat(0x5d),
            ..registration(20)
        };
        assert!(register_scheme(&mut store, &chain, &versions, &other)
            .unwrap()
            .is_none());
        assert_eq!(dao(&store).registered_at, 10);
    }

    #[test]
    fn test_version_lookup_by_controller() {
        let mut store = MemoryStore::new();
        let chain = chain();
        let legacy = ContractVersion::new("0.0.1-rc.16");
        chain.put_versioned_organization(
            &legacy,
            AVATAR,
            OrganizationInfo {
                name: "Legacy".to_string(),
                ..Default::default()
            },
        );
        let versions = VersionRegistry::from_entries(
            ContractVersion::new("0.0.1-rc.32"),
            &[VersionEntry {
                tag: legacy.tag().to_string(),
                addresses: BTreeSet::from([CONTROLLER]),
            }],
        );

        let created = register_scheme(&mut store, &chain, &versions, &registration(1))
            .unwrap()
            .unwrap();
        assert_eq!(created.name, "Legacy");
        assert_eq!(created.version, "0.0.1-rc.16");
    }

    #[test]
    fn test_organization_read_failure_is_recorded() {
        let mut store = MemoryStore::new();
        let chain = RecordedChain::new();
        chain.set_reverting(AVATAR);

        let created = register_scheme(&mut store, &chain, &VersionRegistry::default(), &registration(1))
            .unwrap()
            .unwrap();
        assert!(created.name.is_empty());
        assert_eq!(created.read_failures.len(), 1);

        record_read_failure(&mut store, &AVATAR, "x".to_string()).unwrap();
        record_read_failure(&mut store, &AVATAR, "x".to_string()).unwrap();
        assert_eq!(dao(&store).read_failures.len(), 2);
    }

    #[test]
    fn test_unregister_scheme() {
        let mut store = MemoryStore::new();
        let chain = chain();
        register_scheme(&mut store, &chain, &VersionRegistry::default(), &registration(1)).unwrap();

        assert!(unregister_scheme(&mut store, &AVATAR, &SCHEME, 5).unwrap());
        assert!(!unregister_scheme(&mut store, &AVATAR, &SCHEME, 6).unwrap());
        assert!(!is_scheme_registered(&store, &AVATAR, &SCHEME).unwrap());

        register_scheme(&mut store, &chain, &VersionRegistry::default(), &registration(7)).unwrap();
        assert!(is_scheme_registered(&store, &AVATAR, &SCHEME).unwrap());
    }

    #[test]
    fn test_mints_before_dao_are_backfilled() {
        let mut store = MemoryStore::new();
        let chain = chain();
        let alice = Address::repeat(0x01);
        let bob = Address::repeat(0x02);
        chain.put_balance(REP, alice, Amount::from(100));
        chain.put_balance(REP, bob, Amount::from(200));

        let change = apply_reputation_change(&mut store, &chain, &REP, &alice, 1).unwrap();
        assert_eq!(change, Some(HolderChange::Joined { dao: None }));
        apply_reputation_change(&mut store, &chain, &REP, &bob, 2).unwrap();

        register_scheme(&mut store, &chain, &VersionRegistry::default(), &registration(3)).unwrap();
        assert_eq!(dao(&store).reputation_holders_count, 2);

        let holder: ReputationHolder = store
            .load(&compound_id(&[&REP, &alice]))
            .unwrap()
            .unwrap();
        assert_eq!(holder.dao, Some(AVATAR));
    }

    #[test]
    fn test_membership_transitions() {
        let mut store = MemoryStore::new();
        let chain = chain();
        register_scheme(&mut store, &chain, &VersionRegistry::default(), &registration(1)).unwrap();
        let alice = Address::repeat(0x01);

        chain.put_balance(REP, alice, Amount::from(10));
        apply_reputation_change(&mut store, &chain, &REP, &alice, 2).unwrap();
        assert_eq!(dao(&store).reputation_holders_count, 1);

        // Same balance again: nothing changes.
        assert_eq!(
            apply_reputation_change(&mut store, &chain, &REP, &alice, 2).unwrap(),
            None
        );
        assert_eq!(dao(&store).reputation_holders_count, 1);

        chain.put_balance(REP, alice, Amount::from(25));
        assert_eq!(
            apply_reputation_change(&mut store, &chain, &REP, &alice, 3).unwrap(),
            Some(HolderChange::Updated)
        );
        assert_eq!(dao(&store).reputation_holders_count, 1);

        chain.put_balance(REP, alice, Amount::zero());
        assert_eq!(
            apply_reputation_change(&mut store, &chain, &REP, &alice, 4).unwrap(),
            Some(HolderChange::Left)
        );
        assert_eq!(dao(&store).reputation_holders_count, 0);
        assert_eq!(store.count(EntityKind::ReputationHolder), 0);
        let index: HolderIndex = store.load(&REP.to_string()).unwrap().unwrap();
        assert!(index.holders.is_empty());
    }

    #[test]
    fn test_balance_read_failure_skips_update() {
        let mut store = MemoryStore::new();
        let chain = chain();
        let alice = Address::repeat(0x01);
        assert_eq!(
            apply_reputation_change(&mut store, &chain, &REP, &alice, 1).unwrap(),
            None
        );
        assert_eq!(store.count(EntityKind::ReputationHolder), 0);
    }

    #[test]
    fn test_token_supply_refresh() {
        let mut store = MemoryStore::new();
        let chain = chain();
        register_scheme(&mut store, &chain, &VersionRegistry::default(), &registration(1)).unwrap();
        chain.put_total_supply(TOKEN, Amount::from(1500));

        let someone = Address::repeat(0x09);
        assert!(!apply_token_transfer(&mut store, &chain, &TOKEN, &someone, &Address::repeat(8)).unwrap());
        assert!(apply_token_transfer(&mut store, &chain, &TOKEN, &Address::ZERO, &someone).unwrap());
        let token: Token = store.load(&TOKEN.to_string()).unwrap().unwrap();
        assert_eq!(token.total_supply, Amount::from(1500));

        // Untracked token.
        assert!(!apply_token_transfer(&mut store, &chain, &Address::repeat(0x71), &Address::ZERO, &someone).unwrap());
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_read_failure_for_unregistered_dao_is_warned() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();

        let mut store = MemoryStore::new();
        tracing::subscriber::with_default(subscriber, || {
            record_read_failure(&mut store, &AVATAR, "voting_params(0x09): reverted".to_string())
                .unwrap();
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("WARN"));
        assert!(output.contains("read failure for unregistered dao"));
        assert_eq!(store.count(EntityKind::Dao), 0);
    }
}
