//! Mock collaborators for tests: a recording signer and a scripted prompt.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::error::{PaymentError, Result};
use crate::handshake::UserPrompt;
use crate::types::{PaymentRequirement, PendingToolCall, ToolDef};
use crate::wallet::WalletSigner;

/// Records every signing request; optionally refuses to sign.
#[derive(Default)]
pub struct MockSigner {
    /// `(pay_to, max_amount_required, valid_before)` per signing request.
    pub signed: Mutex<Vec<(String, String, u64)>>,
    pub fail: AtomicBool,
}

impl MockSigner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let signer = Self::default();
        signer.fail.store(true, Ordering::Relaxed);
        signer
    }
}

#[async_trait]
impl WalletSigner for MockSigner {
    async fn payment_header(
        &self,
        requirement: &PaymentRequirement,
        valid_before: u64,
    ) -> Result<String> {
        self.signed.lock().unwrap().push((
            requirement.pay_to.clone(),
            requirement.max_amount_required.clone(),
            valid_before,
        ));
        if self.fail.load(Ordering::Relaxed) {
            return Err(PaymentError::Signer("wallet locked".to_string()));
        }
        Ok(format!(
            "signed:{}:{}",
            requirement.pay_to, requirement.max_amount_required
        ))
    }
}

/// One fixed answer per decision point; `None` never answers, to exercise
/// the decision timeout.
pub struct ScriptedPrompt {
    approve: Option<bool>,
    confirm: Option<bool>,
    /// Requirements shown at the payment confirmation, in order.
    pub payment_prompts: Mutex<Vec<PaymentRequirement>>,
}

impl ScriptedPrompt {
    pub fn allow_all() -> Self {
        Self::new(Some(true), Some(true))
    }

    pub fn deny_call() -> Self {
        Self::new(Some(false), Some(false))
    }

    pub fn cancel_payment() -> Self {
        Self::new(Some(true), Some(false))
    }

    pub fn hang() -> Self {
        Self::new(None, None)
    }

    pub fn hang_on_payment() -> Self {
        Self::new(Some(true), None)
    }

    fn new(approve: Option<bool>, confirm: Option<bool>) -> Self {
        Self {
            approve,
            confirm,
            payment_prompts: Mutex::new(Vec::new()),
        }
    }

    async fn answer(scripted: Option<bool>) -> bool {
        match scripted {
            Some(answer) => answer,
            None => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

#[async_trait]
impl UserPrompt for ScriptedPrompt {
    async fn approve_call(&self, _call: &PendingToolCall, _tool: &ToolDef) -> bool {
        Self::answer(self.approve).await
    }

    async fn confirm_payment(
        &self,
        _call: &PendingToolCall,
        requirement: &PaymentRequirement,
    ) -> bool {
        self.payment_prompts.lock().unwrap().push(requirement.clone());
        Self::answer(self.confirm).await
    }
}
