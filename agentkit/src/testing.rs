//! In-memory CDP backend for unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy::dyn_abi::TypedData;
use alloy::primitives::{Address, B256, Bytes, TxHash, address, b256};
use async_trait::async_trait;

use crate::cdp::{
    ApiKeys, CdpApi, CdpClient, CdpConnector, CdpError, ContractDeployment, DeployedContract,
    EncodedCall, EvmServerAccount, EvmSmartAccount, SolanaFaucetResponse, TradeResult,
    UserOperation, UserOperationStatus,
};
use crate::config::CdpCredentials;
use crate::wallet::TransactionRequest;

pub(crate) const SERVER_ADDRESS: Address = address!("0x1111111111111111111111111111111111111111");
pub(crate) const SMART_ADDRESS: Address = address!("0x2222222222222222222222222222222222222222");
pub(crate) const TX_HASH: TxHash =
    b256!("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
pub(crate) const USER_OP_HASH: B256 =
    b256!("0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");
pub(crate) const BUNDLE_TX_HASH: TxHash =
    b256!("0xcccccccccccccccccccccccccccccccccccccccccccccccccccccccccccccccc");

/// A call observed by the mock.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum MockCall {
    GetAccount(Address),
    CreateAccount(Option<String>),
    GetSmartAccount(Address),
    CreateSmartAccount(Address),
    SendTransaction {
        address: Address,
        network: String,
        transaction: TransactionRequest,
    },
    SendUserOperation {
        smart_account: Address,
        owner: Address,
        network: String,
        calls: Vec<EncodedCall>,
        paymaster_url: Option<String>,
    },
    GetUserOperation(B256),
    SignMessage(Address, Vec<u8>),
    SignHash(Address, B256),
    SignTypedData(Address),
    SignTransaction(Address, Bytes),
    Faucet {
        address: Address,
        network: String,
        token: String,
    },
    SolanaFaucet {
        address: String,
        token: String,
    },
    DeployContract(String),
    DeployNft(String),
    DeployToken(String),
    Trade {
        amount: String,
        from: String,
        to: String,
    },
}

/// Shared state inspected by tests.
#[derive(Debug)]
pub(crate) struct MockState {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub fail_requests: AtomicBool,
    pub fail_close: AtomicBool,
    pub server_address: Address,
    pub smart_address: Address,
    pending_polls: AtomicUsize,
    final_status: Mutex<UserOperationStatus>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockState {
    /// Number of `get_user_operation` calls that report `broadcast` before the final status.
    pub fn set_user_op_polls(&self, polls: usize) {
        self.pending_polls.store(polls, Ordering::SeqCst);
    }

    pub fn set_final_status(&self, status: UserOperationStatus) {
        *self.final_status.lock().unwrap() = status;
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: MockCall) -> Result<(), CdpError> {
        self.calls.lock().unwrap().push(call);
        if self.fail_requests.load(Ordering::SeqCst) {
            return Err(CdpError::api(500, "mock failure"));
        }
        Ok(())
    }

    fn user_operation(&self, status: UserOperationStatus) -> UserOperation {
        UserOperation {
            user_op_hash: USER_OP_HASH,
            network: "base-sepolia".into(),
            status,
            calls: Vec::new(),
            transaction_hash: (status == UserOperationStatus::Complete).then_some(BUNDLE_TX_HASH),
        }
    }
}

/// Connector handing out [`MockSession`]s over one shared [`MockState`].
#[derive(Debug, Clone)]
pub(crate) struct MockCdp {
    pub state: Arc<MockState>,
}

impl MockCdp {
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockState {
                opened: AtomicUsize::new(0),
                closed: AtomicUsize::new(0),
                fail_requests: AtomicBool::new(false),
                fail_close: AtomicBool::new(false),
                server_address: SERVER_ADDRESS,
                smart_address: SMART_ADDRESS,
                pending_polls: AtomicUsize::new(0),
                final_status: Mutex::new(UserOperationStatus::Complete),
                calls: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn client(&self) -> CdpClient {
        CdpClient::new(test_keys(), Arc::new(self.clone()))
    }

    pub fn connect_now(&self) -> Box<dyn CdpApi> {
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        Box::new(MockSession {
            state: Arc::clone(&self.state),
            closed: AtomicBool::new(false),
        })
    }
}

pub(crate) fn test_credentials() -> CdpCredentials {
    CdpCredentials::new("key-id", "key-secret", "wallet-secret")
}

pub(crate) fn test_keys() -> ApiKeys {
    test_credentials().require().unwrap()
}

#[async_trait]
impl CdpConnector for MockCdp {
    async fn connect(&self, _keys: &ApiKeys) -> Result<Box<dyn CdpApi>, CdpError> {
        Ok(self.connect_now())
    }
}

struct MockSession {
    state: Arc<MockState>,
    closed: AtomicBool,
}

impl MockSession {
    fn record(&self, call: MockCall) -> Result<(), CdpError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CdpError::Closed);
        }
        self.state.record(call)
    }
}

#[async_trait]
impl CdpApi for MockSession {
    async fn get_account(&self, address: Address) -> Result<EvmServerAccount, CdpError> {
        self.record(MockCall::GetAccount(address))?;
        Ok(EvmServerAccount {
            address,
            name: None,
        })
    }

    async fn create_account(
        &self,
        idempotency_key: Option<&str>,
    ) -> Result<EvmServerAccount, CdpError> {
        self.record(MockCall::CreateAccount(idempotency_key.map(str::to_owned)))?;
        Ok(EvmServerAccount {
            address: self.state.server_address,
            name: None,
        })
    }

    async fn get_smart_account(&self, address: Address) -> Result<EvmSmartAccount, CdpError> {
        self.record(MockCall::GetSmartAccount(address))?;
        Ok(EvmSmartAccount {
            address,
            owners: vec![self.state.server_address],
            name: None,
        })
    }

    async fn create_smart_account(
        &self,
        owner: Address,
        _idempotency_key: Option<&str>,
    ) -> Result<EvmSmartAccount, CdpError> {
        self.record(MockCall::CreateSmartAccount(owner))?;
        Ok(EvmSmartAccount {
            address: self.state.smart_address,
            owners: vec![owner],
            name: None,
        })
    }

    async fn send_transaction(
        &self,
        address: Address,
        network: &str,
        transaction: &TransactionRequest,
    ) -> Result<TxHash, CdpError> {
        self.record(MockCall::SendTransaction {
            address,
            network: network.to_owned(),
            transaction: transaction.clone(),
        })?;
        Ok(TX_HASH)
    }

    async fn send_user_operation(
        &self,
        smart_account: Address,
        owner: Address,
        network: &str,
        calls: &[EncodedCall],
        paymaster_url: Option<&str>,
    ) -> Result<UserOperation, CdpError> {
        self.record(MockCall::SendUserOperation {
            smart_account,
            owner,
            network: network.to_owned(),
            calls: calls.to_vec(),
            paymaster_url: paymaster_url.map(str::to_owned),
        })?;
        Ok(self.state.user_operation(UserOperationStatus::Broadcast))
    }

    async fn get_user_operation(
        &self,
        _smart_account: Address,
        user_op_hash: B256,
    ) -> Result<UserOperation, CdpError> {
        self.record(MockCall::GetUserOperation(user_op_hash))?;
        let pending = self.state.pending_polls.load(Ordering::SeqCst);
        if pending > 0 {
            if pending != usize::MAX {
                self.state.pending_polls.store(pending - 1, Ordering::SeqCst);
            }
            return Ok(self.state.user_operation(UserOperationStatus::Broadcast));
        }
        let status = *self.state.final_status.lock().unwrap();
        Ok(self.state.user_operation(status))
    }

    async fn sign_message(&self, address: Address, message: &[u8]) -> Result<String, CdpError> {
        self.record(MockCall::SignMessage(address, message.to_vec()))?;
        Ok("0xmessage-signature".into())
    }

    async fn sign_hash(&self, address: Address, hash: B256) -> Result<String, CdpError> {
        self.record(MockCall::SignHash(address, hash))?;
        Ok("0xhash-signature".into())
    }

    async fn sign_typed_data(
        &self,
        address: Address,
        _typed_data: &TypedData,
    ) -> Result<String, CdpError> {
        self.record(MockCall::SignTypedData(address))?;
        Ok("0xtyped-signature".into())
    }

    async fn sign_transaction(
        &self,
        address: Address,
        unsigned_transaction: &Bytes,
    ) -> Result<String, CdpError> {
        self.record(MockCall::SignTransaction(address, unsigned_transaction.clone()))?;
        Ok("0xtx-signature".into())
    }

    async fn request_faucet(
        &self,
        address: Address,
        network: &str,
        token: &str,
    ) -> Result<TxHash, CdpError> {
        self.record(MockCall::Faucet {
            address,
            network: network.to_owned(),
            token: token.to_owned(),
        })?;
        Ok(TX_HASH)
    }

    async fn request_solana_faucet(
        &self,
        address: &str,
        token: &str,
    ) -> Result<SolanaFaucetResponse, CdpError> {
        self.record(MockCall::SolanaFaucet {
            address: address.to_owned(),
            token: token.to_owned(),
        })?;
        Ok(SolanaFaucetResponse {
            transaction_signature: "5oLanaSig".into(),
        })
    }

    async fn deploy_contract(
        &self,
        _address: Address,
        _network: &str,
        deployment: &ContractDeployment,
    ) -> Result<DeployedContract, CdpError> {
        self.record(MockCall::DeployContract(deployment.contract_name.clone()))?;
        Ok(deployed())
    }

    async fn deploy_nft(
        &self,
        _address: Address,
        _network: &str,
        name: &str,
        _symbol: &str,
        _base_uri: &str,
    ) -> Result<DeployedContract, CdpError> {
        self.record(MockCall::DeployNft(name.to_owned()))?;
        Ok(deployed())
    }

    async fn deploy_token(
        &self,
        _address: Address,
        _network: &str,
        name: &str,
        _symbol: &str,
        _total_supply: &str,
    ) -> Result<DeployedContract, CdpError> {
        self.record(MockCall::DeployToken(name.to_owned()))?;
        Ok(deployed())
    }

    async fn trade(
        &self,
        _address: Address,
        _network: &str,
        amount: &str,
        from_asset_id: &str,
        to_asset_id: &str,
    ) -> Result<TradeResult, CdpError> {
        self.record(MockCall::Trade {
            amount: amount.to_owned(),
            from: from_asset_id.to_owned(),
            to: to_asset_id.to_owned(),
        })?;
        Ok(TradeResult {
            to_amount: "42.5".into(),
            transaction_hash: TX_HASH,
            transaction_link: "https://sepolia.basescan.org/tx/0xaa".into(),
        })
    }

    async fn close(&self) -> Result<(), CdpError> {
        self.closed.store(true, Ordering::SeqCst);
        self.state.closed.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_close.load(Ordering::SeqCst) {
            return Err(CdpError::Other("mock close failure".into()));
        }
        Ok(())
    }
}

fn deployed() -> DeployedContract {
    DeployedContract {
        contract_address: address!("0x3333333333333333333333333333333333333333"),
        transaction_hash: TX_HASH,
    }
}
