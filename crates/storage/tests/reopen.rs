//! Chain data survives reopening the database.

use sealchain_core::{Block, BlockCommitment, BlockHeader, Hash};
use sealchain_storage::{ChainStore, Storage, StorageError};
use tempfile::TempDir;

fn block(height: u64, parent: Hash) -> Block {
    Block {
        header: BlockHeader {
            version: 1,
            height,
            previous_block_hash: parent,
            seed: Hash::ZERO,
            timestamp_ms: height * 1_000,
            commitment: BlockCommitment::default(),
            bits: 0,
            nonce: height,
        },
        transactions: vec![],
    }
}

#[test]
fn test_chain_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let genesis = block(1, Hash::ZERO);
    let next = block(2, genesis.hash());

    {
        let storage = Storage::open(dir.path()).unwrap();
        let chain = ChainStore::new(&storage);
        chain.init_genesis(&genesis).unwrap();
        chain.append_block(&next).unwrap();
        storage.flush().unwrap();
    }

    let storage = Storage::open(dir.path()).unwrap();
    let chain = ChainStore::new(&storage);
    assert_eq!(chain.get_genesis().unwrap(), Some(genesis.clone()));
    assert_eq!(chain.get_head().unwrap(), Some(next.hash()));
    assert_eq!(chain.get_height().unwrap(), Some(2));
    assert_eq!(chain.get_block_by_height(2).unwrap(), Some(next.clone()));

    // The reopened chain still refuses a second genesis and keeps extending.
    assert!(matches!(
        chain.init_genesis(&block(1, Hash([4; 32]))),
        Err(StorageError::InvalidGenesis(_))
    ));
    chain.append_block(&block(3, next.hash())).unwrap();
    assert_eq!(chain.get_height().unwrap(), Some(3));
}
