//! sled persistence for contracts and their review updates.
//!
//! Two trees, `contracts` and `contract_updates`, keyed by big-endian ids and
//! holding CBOR records. Mutations go through [`ContractStore::transact`],
//! which spans both trees in one serializable sled transaction, so a contract
//! and its live update always change together.
use sled::transaction::{
    ConflictableTransactionError, TransactionError, TransactionalTree,
};
use sled::{Db, IVec, Transactional, Tree};
use std::sync::Arc;

use crate::contract::{Contract, ContractDetails};
use crate::error::WorkflowError;
use crate::update::ContractUpdate;

pub type TxResult<T> = Result<T, ConflictableTransactionError<WorkflowError>>;

pub struct ContractStore {
    instance: Arc<Db>,
    contracts: Tree,
    updates: Tree,
}

/// View of both trees inside a transaction.
pub struct StoreTx<'a> {
    contracts: &'a TransactionalTree,
    updates: &'a TransactionalTree,
}

fn key(id: u64) -> IVec {
    IVec::from(&id.to_be_bytes()[..])
}

fn encode<T: minicbor::Encode<()>>(value: &T) -> Result<Vec<u8>, WorkflowError> {
    minicbor::to_vec(value).map_err(|e| WorkflowError::Codec(e.to_string()))
}

fn decode<T: for<'b> minicbor::Decode<'b, ()>>(bytes: &[u8]) -> Result<T, WorkflowError> {
    minicbor::decode(bytes).map_err(|e| WorkflowError::Codec(e.to_string()))
}

/// Abort the surrounding transaction with `err`.
pub fn abort<T>(err: WorkflowError) -> TxResult<T> {
    Err(ConflictableTransactionError::Abort(err))
}

impl ContractStore {
    pub fn new(instance: Arc<Db>) -> Result<Self, WorkflowError> {
        let contracts = instance.open_tree("contracts")?;
        let updates = instance.open_tree("contract_updates")?;
        Ok(Self {
            instance,
            contracts,
            updates,
        })
    }

    pub fn next_id(&self) -> Result<u64, WorkflowError> {
        // sled ids start at zero; keep zero free so it never looks like a default
        Ok(self.instance.generate_id()? + 1)
    }

    pub fn insert_contract(&self, details: ContractDetails) -> Result<Contract, WorkflowError> {
        let contract = details.finalise(self.next_id()?)?;
        self.contracts.insert(key(contract.id), encode(&contract)?)?;
        Ok(contract)
    }

    pub fn contract(&self, id: u64) -> Result<Contract, WorkflowError> {
        match self.contracts.get(key(id))? {
            Some(bytes) => decode(&bytes),
            None => Err(WorkflowError::ContractNotFound(id)),
        }
    }

    pub fn update(&self, id: u64) -> Result<ContractUpdate, WorkflowError> {
        match self.updates.get(key(id))? {
            Some(bytes) => decode(&bytes),
            None => Err(WorkflowError::UpdateNotFound(id)),
        }
    }

    pub fn contracts(&self) -> Result<Vec<Contract>, WorkflowError> {
        self.contracts
            .iter()
            .values()
            .map(|bytes| decode(&bytes?))
            .collect()
    }

    pub fn updates(&self) -> Result<Vec<ContractUpdate>, WorkflowError> {
        self.updates
            .iter()
            .values()
            .map(|bytes| decode(&bytes?))
            .collect()
    }

    /// Every update of one contract, oldest first.
    pub fn updates_for(&self, contract_id: u64) -> Result<Vec<ContractUpdate>, WorkflowError> {
        let mut updates: Vec<ContractUpdate> = self
            .updates()?
            .into_iter()
            .filter(|update| update.contract_id == contract_id)
            .collect();
        updates.sort_by_key(ContractUpdate::recency_key);
        Ok(updates)
    }

    /// Most recently created update of a contract, whatever its status.
    pub fn latest_update_for(&self, contract_id: u64) -> Result<Option<ContractUpdate>, WorkflowError> {
        Ok(self.updates_for(contract_id)?.pop())
    }

    /// Run `f` against both trees atomically. `f` may be retried by sled, so it
    /// must not have side effects outside the transaction.
    pub fn transact<R>(&self, f: impl Fn(&StoreTx<'_>) -> TxResult<R>) -> Result<R, WorkflowError> {
        (&self.contracts, &self.updates)
            .transaction(|(contracts, updates)| f(&StoreTx { contracts, updates }))
            .map_err(|err| match err {
                TransactionError::Abort(err) => err,
                TransactionError::Storage(err) => WorkflowError::Storage(err),
            })
    }

    pub fn flush(&self) -> Result<(), WorkflowError> {
        self.instance.flush()?;
        Ok(())
    }
}

impl StoreTx<'_> {
    pub fn contract(&self, id: u64) -> TxResult<Contract> {
        match self.contracts.get(key(id))? {
            Some(bytes) => decode(&bytes).or_else(abort),
            None => abort(WorkflowError::ContractNotFound(id)),
        }
    }

    pub fn update(&self, id: u64) -> TxResult<ContractUpdate> {
        match self.updates.get(key(id))? {
            Some(bytes) => decode(&bytes).or_else(abort),
            None => abort(WorkflowError::UpdateNotFound(id)),
        }
    }

    pub fn put_contract(&self, contract: &Contract) -> TxResult<()> {
        let bytes = encode(contract).or_else(abort)?;
        self.contracts.insert(key(contract.id), bytes)?;
        Ok(())
    }

    pub fn put_update(&self, update: &ContractUpdate) -> TxResult<()> {
        let bytes = encode(update).or_else(abort)?;
        self.updates.insert(key(update.id), bytes)?;
        Ok(())
    }
}
