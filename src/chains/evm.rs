//! Adapter for OApps deployed on EVM chains.

use super::{
    ChainStateReader, TransactionRef, WriteAdapter,
    contracts::{EnforcedOptionParam, IOApp},
};
use crate::{
    error::{ReadError, SubmitError},
    types::{
        EnforcedOption, Endpoint, EndpointId, MsgType, ObservedState, OptionKey, StateQuery,
        decode_options, encode_options,
    },
};
use alloy::{
    network::{EthereumWallet, ReceiptResponse},
    primitives::{Address, Bytes},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
    sol_types::SolCall,
};
use async_trait::async_trait;
use futures_util::{future::try_join_all, lock::Mutex};
use itertools::Itertools;
use std::{collections::BTreeMap, time::Duration};
use tracing::{debug, trace};
use url::Url;

/// OApp adapter for a single EVM chain.
///
/// All transactions are sent from one signer. Submissions are serialized on the signer nonce, so
/// at most one transaction of this adapter is in flight at any time.
#[derive(Debug)]
pub struct EvmChain {
    /// Endpoint id of the chain.
    eid: EndpointId,
    /// Provider used for reads and writes.
    provider: DynProvider,
    /// Address of the signer.
    signer: Address,
    /// Next nonce of the signer, if known.
    nonce: Mutex<Option<u64>>,
    /// How long to wait for a transaction to be included.
    receipt_timeout: Duration,
}

impl EvmChain {
    /// Creates a new [`EvmChain`] talking to `rpc_url` and signing with `signer`.
    pub fn new(
        eid: EndpointId,
        rpc_url: Url,
        signer: PrivateKeySigner,
        receipt_timeout: Duration,
    ) -> Self {
        let address = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::new(signer))
            .connect_http(rpc_url)
            .erased();

        Self { eid, provider, signer: address, nonce: Mutex::new(None), receipt_timeout }
    }

    /// Returns the signer address.
    pub fn signer(&self) -> Address {
        self.signer
    }

    /// Reads the enforced options blob for every message type in `msg_types`.
    async fn read_options(
        &self,
        oapp: Address,
        peer: EndpointId,
        msg_types: impl IntoIterator<Item = MsgType>,
    ) -> Result<Vec<(MsgType, Bytes)>, alloy::contract::Error> {
        let oapp = IOApp::new(oapp, &self.provider);
        try_join_all(msg_types.into_iter().map(async |msg_type| {
            let options = oapp.enforcedOptions(peer, msg_type).call().await?;
            Ok::<_, alloy::contract::Error>((msg_type, options))
        }))
        .await
    }

    /// Sends a transaction with `input` to `to` and waits for it to be included.
    async fn submit(&self, to: Address, input: Bytes) -> Result<TransactionRef, SubmitError> {
        let mut nonce = self.nonce.lock().await;

        let current = match *nonce {
            Some(current) => current,
            None => self.provider.get_transaction_count(self.signer).pending().await?,
        };

        let request = TransactionRequest::default()
            .from(self.signer)
            .to(to)
            .input(input.into())
            .nonce(current);

        let pending = match self.provider.send_transaction(request).await {
            Ok(pending) => pending,
            Err(err) => {
                // Re-fetch the nonce on the next submission.
                *nonce = None;
                return Err(err.into());
            }
        };
        *nonce = Some(current + 1);

        let tx_hash = *pending.tx_hash();
        debug!(eid = self.eid, %tx_hash, nonce = current, "Transaction sent");

        let receipt = match pending.with_timeout(Some(self.receipt_timeout)).get_receipt().await {
            Ok(receipt) => receipt,
            Err(err) => {
                // The transaction may still land, so the nonce is unknown from here on.
                *nonce = None;
                return Err(SubmitError::from_receipt_error(err, self.receipt_timeout));
            }
        };

        if !receipt.status() {
            return Err(SubmitError::Revert(format!("transaction {tx_hash} reverted")));
        }

        Ok(TransactionRef::new(tx_hash.to_string()))
    }
}

#[async_trait]
impl ChainStateReader for EvmChain {
    async fn fetch_observed_state(&self, query: &StateQuery) -> Result<ObservedState, ReadError> {
        let address = query.endpoint.address;
        let oapp = IOApp::new(address, &self.provider);

        let peers = try_join_all(query.peers.iter().map(async |peer_query| {
            let peer = peer_query.peer.eid;
            let msg_types = peer_query.msg_types.iter().copied();
            let (registered, options) = tokio::try_join!(
                async { oapp.peers(peer).call().await },
                self.read_options(address, peer, msg_types),
            )?;
            Ok::<_, alloy::contract::Error>((peer, registered, options))
        }))
        .await
        .map_err(|err| ReadError::unavailable(self.eid, err))?;

        let mut state = ObservedState::new(query.endpoint);
        for (peer, registered, options) in peers {
            state = state.with_peer(peer, registered);
            for (msg_type, encoded) in options {
                let decoded = decode_options(&encoded)
                    .map_err(|err| ReadError::unavailable(self.eid, err))?;
                for (option_type, value) in decoded {
                    state = state.with_option(peer, OptionKey::new(msg_type, option_type), value);
                }
            }
        }

        trace!(eid = self.eid, oapp = %address, peers = state.peers.len(), "Read OApp state");
        Ok(state)
    }
}

#[async_trait]
impl WriteAdapter for EvmChain {
    async fn register_peer(
        &self,
        endpoint: &Endpoint,
        peer: &Endpoint,
    ) -> Result<TransactionRef, SubmitError> {
        let input = IOApp::setPeerCall { _eid: peer.eid, _peer: peer.peer_bytes() }.abi_encode();
        self.submit(endpoint.address, input.into()).await
    }

    async fn set_enforced_options(
        &self,
        endpoint: &Endpoint,
        peer: &Endpoint,
        options: &[EnforcedOption],
    ) -> Result<TransactionRef, SubmitError> {
        // `setEnforcedOptions` replaces the whole blob of a message type, so merge the batch
        // into what is currently enforced.
        let by_msg_type = options.iter().into_group_map_by(|option| option.msg_type);
        let current = self
            .read_options(endpoint.address, peer.eid, by_msg_type.keys().copied().sorted())
            .await
            .map_err(|err| SubmitError::Network(err.to_string()))?;

        let params = current
            .into_iter()
            .map(|(msg_type, encoded)| {
                let mut merged: BTreeMap<_, _> = decode_options(&encoded)
                    .map_err(|err| SubmitError::Rejected(format!("cannot merge options: {err}")))?;
                for option in &by_msg_type[&msg_type] {
                    merged.insert(option.option_type, option.value());
                }
                Ok(EnforcedOptionParam {
                    eid: peer.eid,
                    msgType: msg_type,
                    options: encode_options(merged),
                })
            })
            .collect::<Result<Vec<_>, SubmitError>>()?;

        let input = IOApp::setEnforcedOptionsCall { _enforcedOptions: params }.abi_encode();
        self.submit(endpoint.address, input.into()).await
    }
}
