use docpipe::analyze::AnalysisClient;
use docpipe::blob::BlobClient;
use docpipe::embedding::EmbeddingHttpClient;
use docpipe::extraction::ExtractionClient;
use docpipe::index::{IndexWriter, SearchIndexClient};
use docpipe::metrics::IngestMetrics;
use docpipe::pipeline::IngestService;
use docpipe::tasks::TaskRegistry;
use docpipe::{api, config, logging};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    config::init_config();
    logging::init_tracing();

    let store = Arc::new(BlobClient::new().expect("Failed to build blob client"));
    let extractor = Arc::new(ExtractionClient::new().expect("Failed to build extraction client"));
    let analyzer = Arc::new(AnalysisClient::new().expect("Failed to build analysis client"));
    let embedder = Arc::new(EmbeddingHttpClient::new().expect("Failed to build embedding client"));
    let search = Arc::new(SearchIndexClient::new().expect("Failed to build search client"));
    let writer = Arc::new(IndexWriter::new(search, embedder));

    let service = IngestService::new(
        Arc::new(TaskRegistry::new()),
        store,
        extractor,
        analyzer,
        writer,
        Arc::new(IngestMetrics::new()),
    );
    let app = api::create_router(Arc::new(service));

    let (listener, port) = bind_listener().await.expect("Failed to bind listener");
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await.unwrap();
}

async fn bind_listener() -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    let config = config::get_config();
    if let Some(port) = config.server_port {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 8100..=8199;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 8100-8199",
    ))
}
