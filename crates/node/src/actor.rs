//! Contract actor
//!
//! One actor per contract address. It sees every transaction touching its
//! address, answers requests paid to it, and ignores responses. Entity state
//! is written only after the response has been built, signed and handed to
//! the broadcaster, so a request that is rejected or left unanswered changes
//! nothing.
//!
//! ```text
//! request ──► handler ──validate──► respond ──► commit state
//!                 │                    │
//!                 └──► reject ◄── underfunded / failed
//! ```

use crate::config::NodeConfig;
use crate::error::{NodeError, NodeResult};
use smartledger_core::{Address, ContractKey, RejectionCode, Timestamp, TxId};
use smartledger_enforcement::{EnforcementEngine, FreezeRepository};
use smartledger_governance::{Vote, VoteError, VoteRepository, VoteTarget};
use smartledger_holdings::HoldingsCache;
use smartledger_permissions::{AmendmentAuthority, AmendmentField};
use smartledger_protocol::{
    Action, Broadcaster, Job, JobKind, Response, ResponseWriter, Scheduler, Transaction, TransactionRepository,
    TxOutput,
};
use smartledger_settlement::{Orchestrator, Outcome};
use smartledger_state::{Contract, StateRepository};
use smartledger_storage::Store;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the actor did with one transaction
#[derive(Debug, Clone, PartialEq)]
pub enum Handled {
    Responded { txid: TxId, action: String },
    Rejected { txid: TxId, code: RejectionCode },
    /// Not even a rejection was affordable
    Silent { code: RejectionCode },
    Transfer(Outcome),
    Ignored,
}

impl Handled {
    pub(crate) fn responded(tx: &Transaction) -> Self {
        Handled::Responded {
            txid: tx.txid,
            action: tx.action.name().to_string(),
        }
    }
}

/// Result of trying to answer a request with a success response
pub(crate) enum Reply {
    Sent(Transaction),
    Declined(Handled),
}

pub struct ContractActor {
    pub(crate) key: ContractKey,
    pub(crate) address: Address,
    pub(crate) config: NodeConfig,
    pub(crate) store: Arc<dyn Store>,
    pub(crate) writer: ResponseWriter,
    pub(crate) state: StateRepository,
    pub(crate) holdings: Arc<HoldingsCache>,
    pub(crate) votes: VoteRepository,
    pub(crate) transactions: TransactionRepository,
    pub(crate) enforcement: EnforcementEngine,
    pub(crate) orchestrator: Orchestrator,
    pub(crate) broadcaster: Arc<dyn Broadcaster>,
    pub(crate) scheduler: Arc<dyn Scheduler>,
}

impl ContractActor {
    /// Open the actor for `key`'s address and start its holdings cache
    pub async fn open(
        key: ContractKey,
        config: NodeConfig,
        store: Arc<dyn Store>,
        broadcaster: Arc<dyn Broadcaster>,
        scheduler: Arc<dyn Scheduler>,
    ) -> NodeResult<Self> {
        config.validate()?;
        let address = key.address();
        let state = StateRepository::new(store.clone());
        let holdings = Arc::new(HoldingsCache::new(store.clone()));
        holdings.open(config.holdings_queue_capacity).await;

        let contract_fee = state
            .fetch_contract(&address)
            .await?
            .map_or(0, |contract| contract.terms.contract_fee);
        let writer = ResponseWriter::new(address, config.funding_policy(contract_fee));
        let orchestrator = Orchestrator::new(
            key.clone(),
            writer.clone(),
            store.clone(),
            holdings.clone(),
            broadcaster.clone(),
            scheduler.clone(),
            config.settlement_config(),
        );

        info!(contract = %address, contract_fee, "contract actor opened");
        Ok(Self {
            enforcement: EnforcementEngine::new(
                holdings.clone(),
                state.clone(),
                FreezeRepository::new(store.clone()),
            ),
            votes: VoteRepository::new(store.clone()),
            transactions: TransactionRepository::new(store.clone()),
            key,
            address,
            config,
            store,
            writer,
            state,
            holdings,
            orchestrator,
            broadcaster,
            scheduler,
        })
    }

    /// Flush pending holdings writes and stop the write-behind worker
    pub async fn close(&self) -> NodeResult<()> {
        self.holdings.close().await?;
        info!(contract = %self.address, "contract actor closed");
        Ok(())
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn holdings(&self) -> &Arc<HoldingsCache> {
        &self.holdings
    }

    pub fn state(&self) -> &StateRepository {
        &self.state
    }

    pub fn votes(&self) -> &VoteRepository {
        &self.votes
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Process one transaction seen on the network
    pub async fn handle(&mut self, tx: &Transaction, now: Timestamp) -> NodeResult<Handled> {
        if !tx.touches(&self.address) {
            return Ok(Handled::Ignored);
        }

        let result = match &tx.action {
            Action::Transfer(_) | Action::Settlement(_) | Action::Message(_) | Action::Rejection(_) => {
                let outcome = self.orchestrator.handle(tx, now).await?;
                return Ok(Handled::Transfer(outcome));
            }
            action if !action.is_request() => {
                debug!(txid = %tx.txid, action = action.name(), "response observed");
                return Ok(Handled::Ignored);
            }
            _ if tx.value_to(&self.address) == 0 => {
                debug!(txid = %tx.txid, "request does not pay this contract");
                return Ok(Handled::Ignored);
            }
            Action::ContractOffer(offer) => self.contract_offer(tx, offer, now).await,
            Action::ContractAmendment(amendment) => self.contract_amendment(tx, amendment, now).await,
            Action::AssetDefinition(definition) => self.asset_definition(tx, definition, now).await,
            Action::AssetModification(modification) => self.asset_modification(tx, modification, now).await,
            Action::AgreementOffer(offer) => self.agreement_offer(tx, offer, now).await,
            Action::AgreementAmendment(amendment) => self.agreement_amendment(tx, amendment, now).await,
            Action::Proposal(proposal) => self.proposal(tx, proposal, now).await,
            Action::BallotCast(ballot) => self.ballot_cast(tx, ballot, now).await,
            Action::Order(order) => self.order(tx, order, now).await,
            action => {
                debug!(txid = %tx.txid, action = action.name(), "unhandled request");
                return Ok(Handled::Ignored);
            }
        };

        match result {
            Ok(handled) => Ok(handled),
            Err(e) => match e.rejection() {
                Some(code) => {
                    warn!(txid = %tx.txid, action = tx.action.name(), %code, error = %e, "request rejected");
                    self.reject(tx, code, e.to_string(), now).await
                }
                None => Err(e),
            },
        }
    }

    /// Run a job handed back by the scheduler
    pub async fn run_job(&mut self, job: &Job, now: Timestamp) -> NodeResult<Handled> {
        if job.contract != self.address {
            return Ok(Handled::Ignored);
        }
        debug!(job = %job.id, kind = ?job.kind, "running job");
        match &job.kind {
            JobKind::TransferTimeout { transfer_txid } => {
                let outcome = self.orchestrator.transfer_timeout(transfer_txid, now).await?;
                Ok(Handled::Transfer(outcome))
            }
            JobKind::VoteFinalizer { vote_txid } => self.finalize_vote(vote_txid, now).await,
        }
    }

    /// The contract, or `ContractDoesNotExist`
    pub(crate) async fn load_contract(&self) -> NodeResult<Contract> {
        self.state
            .fetch_contract(&self.address)
            .await?
            .ok_or_else(|| NodeError::rejected(RejectionCode::ContractDoesNotExist, "contract not formed"))
    }

    /// Moved, frozen and expired contracts accept no requests
    pub(crate) fn check_active(&self, contract: &Contract, now: Timestamp) -> NodeResult<()> {
        if let Some(moved_to) = contract.moved_to {
            return Err(NodeError::rejected(
                RejectionCode::ContractMoved,
                format!("contract moved to {}", moved_to),
            ));
        }
        if contract.is_frozen(now) {
            return Err(NodeError::rejected(RejectionCode::ContractFrozen, "contract frozen"));
        }
        if contract.is_expired(now) {
            return Err(NodeError::rejected(RejectionCode::ContractExpired, "contract expired"));
        }
        Ok(())
    }

    /// The request's first input address
    pub(crate) fn requester(&self, tx: &Transaction) -> NodeResult<Address> {
        tx.sender()
            .copied()
            .ok_or_else(|| NodeError::rejected(RejectionCode::TxMalformed, "request has no inputs"))
    }

    pub(crate) fn require_operator(&self, contract: &Contract, requester: &Address) -> NodeResult<()> {
        if contract.is_operator(requester) {
            Ok(())
        } else {
            Err(NodeError::rejected(
                RejectionCode::NotOperator,
                format!("{} is not the administration or operator", requester),
            ))
        }
    }

    /// Authority for an amendment request
    ///
    /// Without a reference the amendment is a direct edit. A reference names
    /// the vote (or its result) whose accepted amendments are being applied.
    pub(crate) async fn amendment_authority(
        &self,
        ref_txid: Option<TxId>,
        target: VoteTarget,
        amendments: &[AmendmentField],
    ) -> NodeResult<(AmendmentAuthority, Option<Vote>)> {
        let Some(ref_txid) = ref_txid else {
            return Ok((AmendmentAuthority::Direct, None));
        };
        let vote = match self.votes.fetch(&self.address, &ref_txid).await? {
            Some(vote) => vote,
            None => self
                .votes
                .list(&self.address)
                .await?
                .into_iter()
                .find(|vote| vote.result_txid == Some(ref_txid))
                .ok_or(VoteError::NotFound(ref_txid))?,
        };
        let authority = vote.authorize(target, amendments)?;
        Ok((authority, Some(vote)))
    }

    /// Record that a vote's amendments were applied by `txid`
    pub(crate) async fn mark_vote_applied(&self, vote: Option<Vote>, txid: TxId, now: Timestamp) -> NodeResult<()> {
        if let Some(mut vote) = vote {
            vote.mark_applied(txid, now)?;
            self.votes.save(&self.address, &vote).await?;
        }
        Ok(())
    }

    /// Rebuild the response writer after the contract fee may have changed
    pub(crate) fn refresh_policy(&mut self, contract: &Contract) {
        if self.writer.policy().contract_fee == contract.terms.contract_fee {
            return;
        }
        self.writer = ResponseWriter::new(self.address, self.config.funding_policy(contract.terms.contract_fee));
        self.orchestrator = Orchestrator::new(
            self.key.clone(),
            self.writer.clone(),
            self.store.clone(),
            self.holdings.clone(),
            self.broadcaster.clone(),
            self.scheduler.clone(),
            self.config.settlement_config(),
        );
        info!(contract = %self.address, contract_fee = contract.terms.contract_fee, "funding policy updated");
    }

    /// Answer a request, or fall back to a funding rejection or silence
    pub(crate) async fn respond(
        &self,
        request: &Transaction,
        outputs: Vec<TxOutput>,
        action: Action,
        now: Timestamp,
    ) -> NodeResult<Reply> {
        match self.writer.respond_or_reject(request, outputs, action, now)? {
            Response::Send(response) => {
                let response = self.send(response).await?;
                match &response.action {
                    Action::Rejection(rejection) => Ok(Reply::Declined(Handled::Rejected {
                        txid: response.txid,
                        code: rejection.code,
                    })),
                    _ => Ok(Reply::Sent(response)),
                }
            }
            Response::Silent { available } => {
                warn!(txid = %request.txid, available, "request too underfunded to answer");
                Ok(Reply::Declined(Handled::Silent {
                    code: RejectionCode::InsufficientTxFeeFunding,
                }))
            }
        }
    }

    /// Reject a request, refunding what the funding allows
    pub(crate) async fn reject(
        &self,
        request: &Transaction,
        code: RejectionCode,
        message: String,
        now: Timestamp,
    ) -> NodeResult<Handled> {
        let available = request.value_to(&self.address);
        if available < self.writer.policy().rejection_minimum() {
            warn!(txid = %request.txid, available, %code, "rejection unaffordable, staying silent");
            return Ok(Handled::Silent { code });
        }
        let rejection = self.writer.reject(request, code, message, now)?;
        let rejection = self.send(rejection).await?;
        Ok(Handled::Rejected {
            txid: rejection.txid,
            code,
        })
    }

    /// Sign, keep and broadcast a response
    pub(crate) async fn send(&self, mut tx: Transaction) -> NodeResult<Transaction> {
        tx.sign_inputs(&self.key);
        self.transactions.save(&self.address, &tx).await?;
        self.broadcaster.broadcast(&tx).await?;
        debug!(txid = %tx.txid, action = tx.action.name(), "response broadcast");
        Ok(tx)
    }
}
