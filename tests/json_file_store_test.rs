use wallet_radar::model::{Quality, WalletProfile};
use wallet_radar::store::{JsonFileStore, ReadModelStore};

#[tokio::test]
async fn publishes_a_readable_json_array() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("wallets.json");
    let store = JsonFileStore::new(path.clone());

    let profiles = vec![
        WalletProfile::new("w1", 91.0, Quality::High, 42),
        WalletProfile::new("w2", 55.0, Quality::Medium, 43),
    ];
    store.publish(&profiles).await;

    let raw = tokio::fs::read(&path).await.expect("file written");
    let parsed: Vec<WalletProfile> = serde_json::from_slice(&raw).expect("valid json");
    assert_eq!(parsed, profiles);
}

#[tokio::test]
async fn creates_missing_parent_directories() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("out.json");
    let store = JsonFileStore::new(path.clone());

    store.publish(&[WalletProfile::new("w1", 20.0, Quality::Low, 1)]).await;

    assert!(path.exists());
}

#[tokio::test]
async fn publish_overwrites_the_previous_read_model() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("wallets.json");
    let store = JsonFileStore::new(path.clone());

    store.publish(&[WalletProfile::new("w1", 91.0, Quality::High, 1)]).await;
    store.publish(&[WalletProfile::new("w2", 70.0, Quality::Medium, 2)]).await;

    let raw = tokio::fs::read(&path).await.expect("file written");
    let parsed: Vec<WalletProfile> = serde_json::from_slice(&raw).expect("valid json");
    assert_eq!(parsed.len(), 1);
    assert_eq!(parsed[0].address, "w2");
}
