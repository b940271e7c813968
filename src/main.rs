#[actix_web::main]
async fn main() -> std::io::Result<()> {
    invoice_generator_server::run().await
}
