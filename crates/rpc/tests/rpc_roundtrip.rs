// rpc/tests/rpc_roundtrip.rs
use chain_core::{units::ether, Provider, Token, TransactionRequest, U256};
use devnet::Devnet;
use rpc::{RpcClient, RpcConfig, RpcMethods, RpcServer};
use smart_contracts::abi::encode_call;
use smart_contracts::contracts::simple_storage;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

async fn serve() -> (Arc<Devnet>, RpcClient) {
    let devnet = Arc::new(Devnet::builtin().unwrap());
    let config = RpcConfig {
        listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        ..Default::default()
    };
    let server = Arc::new(RpcServer::new(config, RpcMethods::new(devnet.clone())));
    let (addr, _handle) = server.spawn().unwrap();
    let client = RpcClient::new(format!("http://{addr}"))
        .unwrap()
        .with_polling_interval(Duration::from_millis(20));
    (devnet, client)
}

#[tokio::test]
async fn test_chain_queries() {
    let (devnet, client) = serve().await;
    assert_eq!(client.chain_id().await.unwrap(), 31337);
    assert_eq!(client.block_number().await.unwrap(), 0);
    assert_eq!(client.accounts().await.unwrap(), devnet.accounts().await.unwrap());

    let genesis = client.get_block(0).await.unwrap().unwrap();
    assert!(genesis.is_genesis());
    assert!(client.get_block(5).await.unwrap().is_none());
}

#[tokio::test]
async fn test_unlocked_transfer() {
    let (_devnet, client) = serve().await;
    let accounts = client.accounts().await.unwrap();

    let hash = client
        .send_transaction(TransactionRequest::new().from(accounts[0]).to(accounts[1]).value(ether(2)))
        .await
        .unwrap();
    let receipt = client.get_transaction_receipt(hash).await.unwrap().unwrap();
    assert!(receipt.succeeded());
    assert_eq!(client.get_balance(accounts[1]).await.unwrap(), ether(10_002));
}

#[tokio::test]
async fn test_locally_signed_deploy_and_call() {
    let (devnet, client) = serve().await;
    let wallet = devnet.dev_accounts().get(3).unwrap().wallet(31337).unwrap();
    let client = client.with_signer(wallet);

    let data = devnet
        .registry()
        .native(simple_storage::NAME)
        .unwrap()
        .deployment_data(&[])
        .unwrap();
    let hash = client
        .send_transaction(TransactionRequest::new().data(data))
        .await
        .unwrap();
    let receipt = client.get_transaction_receipt(hash).await.unwrap().unwrap();
    let storage = receipt.contract_address.unwrap();
    assert_eq!(receipt.from, devnet.dev_accounts().get(3).unwrap().address);

    client
        .send_transaction(
            TransactionRequest::new()
                .to(storage)
                .data(encode_call("store(uint256)", &[Token::Uint(99.into())])),
        )
        .await
        .unwrap();

    let output = client
        .call(&TransactionRequest::new().to(storage).data(encode_call("retrieve()", &[])))
        .await
        .unwrap();
    assert_eq!(U256::from_big_endian(&output), U256::from(99));
}

#[tokio::test]
async fn test_revert_over_the_wire() {
    let (devnet, client) = serve().await;
    let deployer = client.accounts().await.unwrap()[0];
    let data = devnet
        .registry()
        .native(simple_storage::NAME)
        .unwrap()
        .deployment_data(&[])
        .unwrap();
    let hash = client
        .send_transaction(TransactionRequest::new().from(deployer).data(data))
        .await
        .unwrap();
    let storage = client
        .get_transaction_receipt(hash)
        .await
        .unwrap()
        .unwrap()
        .contract_address
        .unwrap();

    let err = client
        .call(
            &TransactionRequest::new()
                .to(storage)
                .data(encode_call("people(uint256)", &[Token::Uint(5.into())])),
        )
        .await
        .unwrap_err();
    assert!(err.is_revert());
}

#[tokio::test]
async fn test_time_travel_and_polled_logs() {
    let (_devnet, client) = serve().await;
    assert_eq!(client.increase_time(30).await.unwrap(), 30);
    assert_eq!(client.mine().await.unwrap(), 1);

    let mut subscription = client
        .subscribe_logs(chain_core::LogFilter::new())
        .await
        .unwrap();
    client.mine().await.unwrap();
    assert!(tokio::time::timeout(Duration::from_millis(100), subscription.next())
        .await
        .is_err());
}
