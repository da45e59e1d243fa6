use signin_session::frameworks::server;

#[tokio::main]
async fn main() {
    server::run_with_config().await;
}
