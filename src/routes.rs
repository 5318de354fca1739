use crate::adapter;
use crate::config::DatabaseConfig;
use crate::connection::{self, ConnectionManager, RetryPolicy};
use crate::driver::Scalar;
use crate::driver::odbc::OdbcDriver;
use crate::error::{CallError, CallErrorKind};
use actix_web::{HttpRequest, HttpResponse, web};
use chrono::{NaiveDate, NaiveDateTime};
use log::debug;
use serde_json::json;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Declared type of a route parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Text,
    Int,
    Float,
    Date,
    DateTime,
}

/// One positional parameter of an endpoint, extracted from the path (or
/// the query string) by name.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
}

/// One row of the route table: path, procedure, ordered parameter list.
#[derive(Debug, Clone, Copy)]
pub struct Endpoint {
    pub path: &'static str,
    pub procedure: &'static str,
    pub params: &'static [ParamSpec],
}

const fn p(name: &'static str, kind: ParamKind) -> ParamSpec {
    ParamSpec { name, kind }
}

const fn ep(
    path: &'static str,
    procedure: &'static str,
    params: &'static [ParamSpec],
) -> Endpoint {
    Endpoint {
        path,
        procedure,
        params,
    }
}

/// The route table. The previous incarnation of this service carried one
/// near-identical handler per procedure; here an endpoint is one row,
/// interpreted by [`dispatch`]. Adding an endpoint is adding a row.
pub const ENDPOINTS: &[Endpoint] = &[
    // Medical appointments
    ep("/citas/disponibles", "pas_citas_disponibles", &[]),
    ep(
        "/citas/agendadas/{usuario}",
        "pas_citas_agendadas",
        &[p("usuario", ParamKind::Text)],
    ),
    ep(
        "/citas/agendar/{usuario}/{cita}",
        "pas_agendar_cita",
        &[p("usuario", ParamKind::Text), p("cita", ParamKind::Int)],
    ),
    ep(
        "/citas/cancelar/{usuario}/{cita}",
        "pas_cancelar_cita",
        &[p("usuario", ParamKind::Text), p("cita", ParamKind::Int)],
    ),
    ep(
        "/citas/reprogramar/{usuario}/{cita}/{fecha}",
        "pas_reprogramar_cita",
        &[
            p("usuario", ParamKind::Text),
            p("cita", ParamKind::Int),
            p("fecha", ParamKind::DateTime),
        ],
    ),
    ep(
        "/citas/historial/{usuario}",
        "pas_historial_citas",
        &[
            p("usuario", ParamKind::Text),
            p("desde", ParamKind::Date),
            p("hasta", ParamKind::Date),
        ],
    ),
    // Sick-leave records
    ep(
        "/incapacidades/{usuario}",
        "pas_incapacidades_usuario",
        &[p("usuario", ParamKind::Text)],
    ),
    ep(
        "/incapacidades/registrar/{usuario}/{inicio}/{dias}/{motivo}",
        "pas_registrar_incapacidad",
        &[
            p("usuario", ParamKind::Text),
            p("inicio", ParamKind::Date),
            p("dias", ParamKind::Int),
            p("motivo", ParamKind::Text),
        ],
    ),
    // Sports programs
    ep("/deportes/programas", "dep_programas", &[]),
    ep(
        "/deportes/inscritos/{programa}",
        "dep_inscritos",
        &[p("programa", ParamKind::Int)],
    ),
    ep(
        "/deportes/inscribir/{usuario}/{programa}",
        "dep_inscribir_usuario",
        &[p("usuario", ParamKind::Text), p("programa", ParamKind::Int)],
    ),
    ep(
        "/deportes/retirar/{usuario}/{programa}",
        "dep_retirar_usuario",
        &[p("usuario", ParamKind::Text), p("programa", ParamKind::Int)],
    ),
    // Economic aid
    ep("/apoyos/convocatorias", "apo_convocatorias", &[]),
    ep(
        "/apoyos/solicitudes/{usuario}",
        "apo_solicitudes_usuario",
        &[p("usuario", ParamKind::Text)],
    ),
    ep(
        "/apoyos/solicitar/{usuario}/{convocatoria}",
        "apo_solicitar_apoyo",
        &[
            p("usuario", ParamKind::Text),
            p("convocatoria", ParamKind::Int),
        ],
    ),
    // Retail / invoicing
    ep("/tienda/productos", "tie_productos", &[]),
    ep(
        "/tienda/facturas/{usuario}",
        "tie_facturas_usuario",
        &[p("usuario", ParamKind::Text)],
    ),
    ep(
        "/tienda/facturar/{usuario}/{producto}/{cantidad}",
        "tie_registrar_factura",
        &[
            p("usuario", ParamKind::Text),
            p("producto", ParamKind::Int),
            p("cantidad", ParamKind::Int),
        ],
    ),
    ep(
        "/tienda/factura/{folio}",
        "tie_detalle_factura",
        &[p("folio", ParamKind::Int)],
    ),
    ep(
        "/tienda/abonar/{usuario}/{folio}/{monto}",
        "tie_abonar_factura",
        &[
            p("usuario", ParamKind::Text),
            p("folio", ParamKind::Int),
            p("monto", ParamKind::Float),
        ],
    ),
];

/// Connection target and retry policy for the login endpoint.
pub struct LoginTarget {
    pub database: DatabaseConfig,
    pub attempts: u32,
    pub delay: Duration,
}

/// Register the route table plus the health and login endpoints.
pub fn configure(cfg: &mut web::ServiceConfig) {
    for endpoint in ENDPOINTS {
        cfg.service(
            web::resource(endpoint.path)
                .app_data(web::Data::new(*endpoint))
                .route(web::get().to(dispatch)),
        );
    }
    cfg.route("/salud", web::get().to(health));
    cfg.route("/acceso/{usuario}/{clave}", web::get().to(login));
}

/// The one generic handler behind every table row: extract and coerce the
/// declared parameters, invoke the procedure, encode the envelope.
async fn dispatch(
    req: HttpRequest,
    endpoint: web::Data<Endpoint>,
    manager: web::Data<ConnectionManager>,
) -> HttpResponse {
    let query = web::Query::<HashMap<String, String>>::from_query(req.query_string())
        .map(web::Query::into_inner)
        .unwrap_or_default();

    let mut args = Vec::with_capacity(endpoint.params.len());
    for param in endpoint.params {
        let raw = req
            .match_info()
            .get(param.name)
            .or_else(|| query.get(param.name).map(String::as_str));
        match coerce(param, raw) {
            Ok(value) => args.push(value),
            Err(e) => return envelope_error(&e),
        }
    }

    let started = Instant::now();
    match manager.call(endpoint.procedure, args).await {
        Ok(records) => {
            debug!(
                "{} returned {} record(s) in {}ms",
                endpoint.procedure,
                records.len(),
                started.elapsed().as_millis()
            );
            HttpResponse::Ok().json(records)
        }
        Err(e) => envelope_error(&e),
    }
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Login path: a bounded connect with the caller's credentials, reported
/// in the usual envelope. Never touches the shared connection.
async fn login(
    path: web::Path<(String, String)>,
    target: web::Data<LoginTarget>,
) -> HttpResponse {
    let (usuario, clave) = path.into_inner();
    let config = target.database.with_credentials(&usuario, &clave);
    let policy = RetryPolicy::Bounded {
        attempts: target.attempts,
        delay: target.delay,
    };
    let factory = move || OdbcDriver::connect(&config);
    match connection::verify_credentials(factory, policy).await {
        Ok(()) => HttpResponse::Ok().json(vec![adapter::status_record("Ok")]),
        Err(e) if e.kind == CallErrorKind::Auth => {
            envelope_error(&CallError::auth("Wrong credentials"))
        }
        Err(e) => envelope_error(&e),
    }
}

// Domain failures ride in the body; the transport status stays 200.
fn envelope_error(error: &CallError) -> HttpResponse {
    HttpResponse::Ok().json(adapter::error_records(error))
}

/// Coerce a raw parameter per its declared kind. Date kinds are validated
/// here and passed to the driver as the original ISO text.
fn coerce(param: &ParamSpec, raw: Option<&str>) -> Result<Scalar, CallError> {
    let raw = match raw {
        Some(value) => value,
        None => {
            return Err(CallError::invalid(format!(
                "missing parameter '{}'",
                param.name
            )));
        }
    };
    match param.kind {
        ParamKind::Text => Ok(Scalar::Text(raw.to_string())),
        ParamKind::Int => raw.parse::<i64>().map(Scalar::Int).map_err(|_| {
            CallError::invalid(format!("parameter '{}' must be an integer", param.name))
        }),
        ParamKind::Float => raw.parse::<f64>().map(Scalar::Float).map_err(|_| {
            CallError::invalid(format!("parameter '{}' must be a number", param.name))
        }),
        ParamKind::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(|_| Scalar::Text(raw.to_string()))
            .map_err(|_| {
                CallError::invalid(format!(
                    "parameter '{}' must be a date (YYYY-MM-DD)",
                    param.name
                ))
            }),
        ParamKind::DateTime => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
            .map(|_| Scalar::Text(raw.to_string()))
            .map_err(|_| {
                CallError::invalid(format!(
                    "parameter '{}' must be a datetime (YYYY-MM-DDTHH:MM:SS)",
                    param.name
                ))
            }),
    }
}
