//! Block persistence and chain head tracking.

use crate::db::{Entry, Result, Storage, StorageError};
use sealchain_core::{Block, Hash};
use tracing::info;

const CHAIN_HEAD_KEY: &[u8] = b"chain:head";
const CHAIN_HEIGHT_KEY: &[u8] = b"chain:height";
const CHAIN_GENESIS_KEY: &[u8] = b"chain:genesis";

/// Stores sealed blocks by hash and height.
pub struct ChainStore<'a> {
    storage: &'a Storage,
}

impl<'a> ChainStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Store a block under its hash, and index the hash by height.
    pub fn put_block(&self, block: &Block) -> Result<()> {
        let entries = Self::block_entries(block, &block.hash())?;
        self.storage.put_all(&entries)
    }

    fn block_entries(block: &Block, hash: &Hash) -> Result<Vec<Entry>> {
        Ok(vec![
            Storage::entry(Storage::block_hash_key(hash), block)?,
            Storage::entry(Storage::block_height_key(block.header.height), hash)?,
        ])
    }

    /// Block, height index and new head, written together.
    fn head_entries(block: &Block, hash: &Hash) -> Result<Vec<Entry>> {
        let mut entries = Self::block_entries(block, hash)?;
        entries.push(Storage::entry(CHAIN_HEAD_KEY, hash)?);
        entries.push(Storage::entry(CHAIN_HEIGHT_KEY, &block.header.height)?);
        Ok(entries)
    }

    pub fn get_block_by_hash(&self, hash: &Hash) -> Result<Option<Block>> {
        self.storage.get(Storage::block_hash_key(hash))
    }

    pub fn get_block_by_height(&self, height: u64) -> Result<Option<Block>> {
        let hash: Option<Hash> = self.storage.get(Storage::block_height_key(height))?;
        match hash {
            Some(h) => self.get_block_by_hash(&h),
            None => Ok(None),
        }
    }

    pub fn get_head(&self) -> Result<Option<Hash>> {
        self.storage.get(CHAIN_HEAD_KEY)
    }

    pub fn get_height(&self) -> Result<Option<u64>> {
        self.storage.get(CHAIN_HEIGHT_KEY)
    }

    pub fn get_genesis(&self) -> Result<Option<Block>> {
        match self.storage.get::<_, Hash>(CHAIN_GENESIS_KEY)? {
            Some(hash) => self.get_block_by_hash(&hash),
            None => Ok(None),
        }
    }

    pub fn is_initialized(&self) -> Result<bool> {
        self.storage.contains(CHAIN_GENESIS_KEY)
    }

    /// Record the genesis block. Genesis is written exactly once; a second
    /// call is accepted only with the identical block.
    pub fn init_genesis(&self, genesis: &Block) -> Result<()> {
        let hash = genesis.hash();
        if let Some(existing) = self.storage.get::<_, Hash>(CHAIN_GENESIS_KEY)? {
            if existing == hash {
                return Ok(());
            }
            return Err(StorageError::InvalidGenesis(format!(
                "chain already initialized with genesis {existing}"
            )));
        }

        let mut entries = Self::head_entries(genesis, &hash)?;
        entries.push(Storage::entry(CHAIN_GENESIS_KEY, &hash)?);
        self.storage.put_all(&entries)?;
        self.storage.flush()?;

        info!(
            hash = %hash,
            height = genesis.header.height,
            "stored genesis block"
        );
        Ok(())
    }

    /// Append a block on top of the current head.
    ///
    /// Only linkage is checked here; commitment and proof-of-work checks
    /// belong to the caller.
    pub fn append_block(&self, block: &Block) -> Result<()> {
        let (head, height) = match (self.get_head()?, self.get_height()?) {
            (Some(head), Some(height)) => (head, height),
            _ => return Err(StorageError::NotFound("chain head".into())),
        };

        if block.header.height != height + 1 {
            return Err(StorageError::InvalidBlock(format!(
                "expected height {}, got {}",
                height + 1,
                block.header.height
            )));
        }
        if block.header.previous_block_hash != head {
            return Err(StorageError::InvalidBlock(format!(
                "parent {} does not match head {}",
                block.header.previous_block_hash, head
            )));
        }

        let hash = block.hash();
        self.storage.put_all(&Self::head_entries(block, &hash)?)?;
        info!(hash = %hash, height = block.header.height, "appended block");
        Ok(())
    }
}
