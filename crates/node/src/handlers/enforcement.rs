//! Enforcement orders

use crate::actor::{ContractActor, Handled, Reply};
use crate::error::NodeResult;
use smartledger_core::Timestamp;
use smartledger_protocol::{Order, Transaction, TxOutput};
use tracing::info;

impl ContractActor {
    pub(crate) async fn order(&mut self, tx: &Transaction, order: &Order, now: Timestamp) -> NodeResult<Handled> {
        let mut contract = self.load_contract().await?;
        let requester = self.requester(tx)?;
        let plan = self.enforcement.plan(&contract, order, &requester, now).await?;

        // Quantity indices in the response refer to these outputs; a freeze
        // of a whole asset or contract points at the contract itself.
        let dust = self.writer.policy().dust_limit;
        let mut outputs: Vec<TxOutput> = plan
            .recipients()
            .into_iter()
            .map(|(address, value)| TxOutput::new(address, value.max(dust)))
            .collect();
        if outputs.is_empty() {
            outputs.push(TxOutput::new(self.address, dust));
        }

        let action = plan.action(now);
        let response = match self.respond(tx, outputs, action, now).await? {
            Reply::Sent(response) => response,
            Reply::Declined(handled) => return Ok(handled),
        };

        self.enforcement.commit(&mut contract, &plan, response.txid, now).await?;
        info!(
            contract = %self.address,
            action = response.action.name(),
            response = %response.txid,
            "order executed"
        );
        Ok(Handled::responded(&response))
    }
}
