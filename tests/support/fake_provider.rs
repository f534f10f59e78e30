// ABOUTME: SdkProvider handing out one shared in-memory client for every environment.
// ABOUTME: Records which access modes and roles were requested.

use super::fake_sdk::FakeSdk;
use super::{ACCOUNT, REGION};
use async_trait::async_trait;
use parking_lot::Mutex;
use stackpilot::environment::ResolvedEnvironment;
use stackpilot::provider::{
    AccessMode, Account, AssumeRole, ProvisionError, SdkForEnvironment, SdkProvider,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug)]
pub struct FakeProvider {
    sdk: Arc<FakeSdk>,
    access_key_id: Option<String>,
    account_lookups: AtomicUsize,
    requests: Mutex<Vec<(AccessMode, Option<String>)>>,
}

impl FakeProvider {
    pub fn new(sdk: Arc<FakeSdk>) -> Self {
        Self {
            sdk,
            access_key_id: Some("AKIATESTKEY".to_string()),
            account_lookups: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// How often the default account was asked for remotely.
    pub fn account_lookups(&self) -> usize {
        self.account_lookups.load(Ordering::SeqCst)
    }

    /// Access mode and assumed role ARN of every client request.
    pub fn requests(&self) -> Vec<(AccessMode, Option<String>)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl SdkProvider for FakeProvider {
    type Sdk = FakeSdk;

    fn default_region(&self) -> String {
        REGION.to_string()
    }

    fn default_access_key_id(&self) -> Option<String> {
        self.access_key_id.clone()
    }

    async fn lookup_default_account(&self) -> Result<Option<Account>, ProvisionError> {
        self.account_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(Some(Account {
            account_id: ACCOUNT.to_string(),
            partition: "aws".to_string(),
        }))
    }

    async fn for_environment(
        &self,
        _environment: &ResolvedEnvironment,
        mode: AccessMode,
        role: Option<&AssumeRole>,
    ) -> Result<SdkForEnvironment<Self::Sdk>, ProvisionError> {
        self.requests
            .lock()
            .push((mode, role.map(|r| r.role_arn.clone())));
        Ok(SdkForEnvironment {
            sdk: Arc::clone(&self.sdk),
            did_assume_role: role.is_some(),
        })
    }
}
