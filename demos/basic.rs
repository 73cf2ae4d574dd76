use clinic_http::{
    ClientConfig, HttpClient, MemoryStore, RequestOptions, StorageContextProvider, UploadForm,
};
use serde_json::{json, Value as JsonValue};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let token = std::env::var("CLINIC_API_TOKEN")?;

    let store = MemoryStore::new();
    store.set_item(
        "clinic-auth",
        json!({ "state": { "token": token, "user": { "clinicId": "demo-clinic" } } }).to_string(),
    );

    let client = HttpClient::new(ClientConfig::from_env())
        .with_context(StorageContextProvider::new(store));

    let ping: JsonValue = client.get_json("/api/ping", RequestOptions::new()).await?;
    println!("ping: {ping}");

    let patients: JsonValue = client
        .get_with_auth("/api/patients", RequestOptions::new())
        .await?;
    println!("patients: {patients}");

    let response = client
        .http_with_retry("/api/appointments/today", RequestOptions::new())
        .await?;
    println!("appointments: {:?}", response.body);

    let form = UploadForm::new()
        .text("patientId", "p-1")
        .file("scan", "scan.bin", vec![0u8; 256 * 1024]);
    let uploaded = client
        .upload_with_progress("/api/documents", form, RequestOptions::new(), |progress| {
            println!("upload {}% ({}/{})", progress.percent, progress.loaded, progress.total);
        })
        .await?;
    println!("uploaded: {uploaded:?}");

    Ok(())
}
