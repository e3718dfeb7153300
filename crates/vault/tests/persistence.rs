//! Vault records survive reopening the database.

use sealchain_core::{hash, DerivationPath};
use sealchain_storage::Storage;
use sealchain_vault::{KdfParams, Vault, VaultConfig, VaultError};
use tempfile::TempDir;

fn config() -> VaultConfig {
    VaultConfig {
        kdf: KdfParams::insecure_fast(),
        ..VaultConfig::default()
    }
}

#[test]
fn test_keys_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = DerivationPath::from_indices(&[1, 2]);
    let digest = hash(b"reopen");

    let key = {
        let vault = Vault::new(Storage::open(dir.path()).unwrap(), config());
        vault.create_key("cold", "pw").unwrap()
    };

    let vault = Vault::new(Storage::open(dir.path()).unwrap(), config());
    assert_eq!(vault.get_key(&key.xpub).unwrap(), Some(key.clone()));
    assert!(matches!(
        vault.create_key("cold", "pw"),
        Err(VaultError::DuplicateAlias(_))
    ));

    let sig = vault.sign(&key.xpub, &path, digest.as_bytes(), "pw").unwrap();
    let child = key.xpub.derive(&path).unwrap();
    assert!(child.verify(digest.as_bytes(), &sig).is_ok());
}

#[test]
fn test_walk_every_page() {
    let vault = Vault::new(Storage::open_temporary().unwrap(), config());
    let mut created: Vec<String> = (0..7)
        .map(|i| vault.create_key(&format!("key-{i:02}"), "pw").unwrap().alias)
        .collect();
    created.sort();

    let mut seen = Vec::new();
    let mut cursor = String::new();
    loop {
        let page = vault.list_keys(&cursor, 3).unwrap();
        seen.extend(page.items.iter().map(|k| k.alias.clone()));
        cursor = page.next;
        if page.last_page {
            break;
        }
    }
    assert_eq!(seen, created);
}

#[test]
fn test_vault_shares_database_with_chain_data() {
    let storage = Storage::open_temporary().unwrap();
    storage.put("chain:height", &5u64).unwrap();

    let vault = Vault::new(storage.clone(), config());
    vault.create_key("hot", "pw").unwrap();

    assert_eq!(vault.len().unwrap(), 1);
    assert_eq!(vault.list_keys("", 0).unwrap().items.len(), 1);
    assert_eq!(storage.get::<_, u64>("chain:height").unwrap(), Some(5));
}
