//! Admin HTTP surface: the `/csv` query-log dump endpoint.
//!
//! An `actix-web::App` wired with `app_data` and routed by `.to(handler)`,
//! serving a single read-only dump GET route.

use std::io::Write;
use std::sync::Arc;

use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use tokio::sync::Mutex;

use crate::error::http::AdminHttpError;
use crate::querylog::{QueryLogBuffer, QueryLogStore};

/// Shared state the `/csv` handler is built from. The store is guarded by
/// an async mutex so two concurrent dump requests serialize rather than
/// racing to rotate the same bucket.
struct AdminState {
    buffer: Arc<QueryLogBuffer>,
    store: Arc<Mutex<QueryLogStore>>,
}

fn accepts_gzip(req: &HttpRequest) -> bool {
    req.headers()
        .get(actix_web::http::header::ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("gzip"))
}

fn gzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()
}

/// `GET /csv`: flush the write buffer into the durable store, rotate it,
/// and stream the rotated content as CSV, gzip-compressed if the client
/// advertised support for it.
async fn csv_dump(req: HttpRequest, state: web::Data<AdminState>) -> actix_web::Result<HttpResponse, AdminHttpError> {
    let store = state.store.lock().await;
    store.merge(state.buffer.drain());
    let rotated = store.rotate();
    let csv = QueryLogStore::to_csv(&rotated);

    if accepts_gzip(&req) {
        let compressed = gzip(csv.as_bytes())?;
        Ok(HttpResponse::Ok()
            .content_type("text/csv")
            .insert_header((actix_web::http::header::CONTENT_ENCODING, "gzip"))
            .body(compressed))
    } else {
        Ok(HttpResponse::Ok().content_type("text/csv").body(csv))
    }
}

async fn not_found() -> actix_web::Result<HttpResponse, AdminHttpError> {
    Err(AdminHttpError::NotFound)
}

/// Start the admin HTTP server. Runs until the process is shut down;
/// callers spawn this as its own task alongside the DNS listeners.
///
/// `store` is shared with the caller's periodic buffer-rotation merge task
/// so both paths fold into the same durable bucket.
pub async fn serve(
    listen: std::net::SocketAddr,
    buffer: Arc<QueryLogBuffer>,
    store: Arc<Mutex<QueryLogStore>>,
) -> std::io::Result<()> {
    log::info!("admin HTTP surface listening on {listen}");
    let state = web::Data::new(AdminState { buffer, store });

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .route("/csv", web::get().to(csv_dump))
            .default_service(web::route().to(not_found))
    })
    .workers(1)
    .bind(listen)?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_server::proto::op::{MessageType, OpCode, ResponseCode};
    use hickory_server::proto::rr::rdata::A;
    use hickory_server::proto::rr::{DNSClass, Name, RData, RecordType};
    use std::net::Ipv4Addr;
    use std::str::FromStr;

    fn a_response(name: &str) -> crate::message::Message {
        crate::message::Message {
            id: 1,
            op_code: OpCode::Query,
            message_type: MessageType::Response,
            response_code: ResponseCode::NoError,
            truncated: false,
            authoritative: false,
            recursion_desired: true,
            recursion_available: true,
            authentic_data: false,
            checking_disabled: false,
            question: Some(crate::message::Question {
                name: Name::from_str(name).unwrap(),
                qtype: RecordType::A,
                qclass: DNSClass::IN,
            }),
            answers: vec![crate::message::RecordData {
                name: Name::from_str(name).unwrap(),
                rtype: RecordType::A,
                rclass: DNSClass::IN,
                ttl: 300,
                rdata: RData::A(A(Ipv4Addr::new(93, 184, 216, 34))),
            }],
            name_servers: vec![],
            additionals: vec![],
            edns: None,
        }
    }

    #[actix_web::test]
    async fn csv_dump_reflects_buffered_queries() {
        let buffer = Arc::new(QueryLogBuffer::new());
        buffer.record(&a_response("example.com."));
        let state = web::Data::new(AdminState { buffer, store: Arc::new(Mutex::new(QueryLogStore::new())) });

        let app = actix_web::test::init_service(
            App::new()
                .app_data(state.clone())
                .route("/csv", web::get().to(csv_dump))
                .default_service(web::route().to(not_found)),
        )
        .await;
        let req = actix_web::test::TestRequest::get().uri("/csv").to_request();
        let resp = actix_web::test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        let body = actix_web::test::read_body(resp).await;
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.starts_with("name,type,rcode,answer,hits\n"));
        assert!(text.contains("example.com,A,NOERROR,"));
        assert!(text.trim_end().ends_with(",1"));
    }

    #[actix_web::test]
    async fn unknown_path_is_not_found() {
        let buffer = Arc::new(QueryLogBuffer::new());
        let state = web::Data::new(AdminState { buffer, store: Arc::new(Mutex::new(QueryLogStore::new())) });
        let app = actix_web::test::init_service(
            App::new()
                .app_data(state.clone())
                .route("/csv", web::get().to(csv_dump))
                .default_service(web::route().to(not_found)),
        )
        .await;
        let req = actix_web::test::TestRequest::get().uri("/nope").to_request();
        let resp = actix_web::test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);
    }

    #[test]
    fn gzip_round_trips_to_nonempty_bytes() {
        let compressed = gzip(b"name,type,rcode,answer,hits\n").unwrap();
        assert!(!compressed.is_empty());
    }
}
