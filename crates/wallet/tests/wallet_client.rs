// wallet/tests/wallet_client.rs
use chain_core::{Address, Provider, Token, TransactionRequest, U256};
use devnet::Devnet;
use smart_contracts::contracts::{fund_me, mock_v3_aggregator};
use std::sync::Arc;
use wallet::{Button, ConnectionStatus, NodeWallet, WalletClient, WalletError};

async fn deploy(devnet: &Devnet, from: Address, name: &str, args: &[Token]) -> Address {
    let data = devnet.registry().native(name).unwrap().deployment_data(args).unwrap();
    let hash = devnet
        .send_transaction(TransactionRequest::new().from(from).data(data))
        .await
        .unwrap();
    devnet
        .get_transaction_receipt(hash)
        .await
        .unwrap()
        .unwrap()
        .contract_address
        .unwrap()
}

async fn setup() -> (Arc<Devnet>, Address) {
    let devnet = Arc::new(Devnet::builtin().unwrap());
    let deployer = devnet.accounts().await.unwrap()[0];
    let feed = deploy(
        &devnet,
        deployer,
        mock_v3_aggregator::NAME,
        &[
            Token::Uint(mock_v3_aggregator::DECIMALS.into()),
            Token::Int(mock_v3_aggregator::int256(mock_v3_aggregator::INITIAL_ANSWER)),
        ],
    )
    .await;
    let fund_me = deploy(&devnet, deployer, fund_me::NAME, &[Token::Address(feed)]).await;
    (devnet, fund_me)
}

#[tokio::test]
async fn test_connect_fund_balance_withdraw() {
    let (devnet, fund_me) = setup().await;
    let mut client = WalletClient::new(Some(Arc::new(NodeWallet::new(devnet.clone()))), fund_me);

    assert!(matches!(client.fund("1").await, Err(WalletError::NotConnected)));

    let status = client.connect().await;
    let deployer = devnet.accounts().await.unwrap()[0];
    assert_eq!(status, ConnectionStatus::Connected(deployer));
    assert_eq!(status.label(), "Connected");

    let receipt = client.fund("1").await.unwrap();
    assert!(receipt.succeeded());
    assert!(client.balance().await.unwrap().starts_with("1.0"));

    client.withdraw().await.unwrap();
    assert_eq!(devnet.get_balance(fund_me).await.unwrap(), U256::zero());
}

#[tokio::test]
async fn test_failed_fund_is_logged_not_raised() {
    let (devnet, fund_me) = setup().await;
    let mut client = WalletClient::new(Some(Arc::new(NodeWallet::new(devnet.clone()))), fund_me);
    client.click(Button::Connect).await;

    // below the 50 USD minimum
    let err = client.fund("0.0001").await.unwrap_err();
    assert!(matches!(err, WalletError::Chain(ref e) if e.revert_reason() == Some(fund_me::NOT_ENOUGH)));

    client.click(Button::Fund("not a number".into())).await;
    client.click(Button::Fund("0.0001".into())).await;
    assert_eq!(devnet.get_balance(fund_me).await.unwrap(), U256::zero());
}
