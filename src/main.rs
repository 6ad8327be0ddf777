#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    campus_portal::run().await
}
