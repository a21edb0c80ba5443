use actix_web::http::header::{self, ContentType};
use actix_web::http::StatusCode;
use actix_web::web::{self, Data};
use actix_web::{HttpRequest, HttpResponse, ResponseError};
use tracing::{error, warn};

use crate::controller::{self, ControllerError};
use crate::service::deployment::{self, DeploymentCoordinator};
use crate::service::dispatcher::{self, Dispatcher, InboundRequest};
use crate::service::provisioner;

impl ResponseError for ControllerError {
    fn status_code(&self) -> StatusCode {
        match self {
            ControllerError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            ControllerError::Deployment(err) => match err {
                deployment::Error::Conflict(..) => StatusCode::CONFLICT,
                deployment::Error::UnknownFunction(_) => StatusCode::NOT_FOUND,
                deployment::Error::Provision(
                    provisioner::Error::BuildFailed { .. }
                    | provisioner::Error::NoWorkersAvailable { .. },
                )
                | deployment::Error::Interrupted(..) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ControllerError::Dispatch(err) => match err {
                dispatcher::Error::MalformedCallPath(_)
                | dispatcher::Error::UnknownFunction(_) => StatusCode::NOT_FOUND,
                dispatcher::Error::FunctionNotReady(..) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                dispatcher::Error::InvalidMethod(_) => StatusCode::BAD_REQUEST,
                dispatcher::Error::EmptyPool(_)
                | dispatcher::Error::DispatchTimeout { .. } => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("{}", self);
        } else {
            warn!("{}", self);
        }
        HttpResponse::build(status)
            .content_type(ContentType::plaintext())
            .body(format!("{}\n", self))
    }
}

/// Deploy a function and return once it accepts calls.
pub async fn post_function(
    body: web::Bytes,
    coordinator: Data<DeploymentCoordinator>,
) -> Result<HttpResponse, ControllerError> {
    let deployed = controller::function::deploy(&body, &coordinator).await?;
    Ok(HttpResponse::Created()
        .content_type(ContentType::plaintext())
        .body(controller::function::created_message(&deployed)))
}

pub async fn delete_function(
    name: web::Path<String>,
    coordinator: Data<DeploymentCoordinator>,
) -> Result<HttpResponse, ControllerError> {
    let name = controller::function::undeploy(&name, &coordinator).await?;
    Ok(HttpResponse::Ok()
        .content_type(ContentType::plaintext())
        .body(format!("Function {} removed\n", name)))
}

pub async fn get_functions(
    coordinator: Data<DeploymentCoordinator>,
) -> HttpResponse {
    HttpResponse::Ok().json(controller::function::list(&coordinator).await)
}

/// Forward a call to one of the function's workers and mirror its answer.
pub async fn call(
    req: HttpRequest,
    body: web::Bytes,
    dispatcher: Data<Dispatcher>,
) -> Result<HttpResponse, ControllerError> {
    let request = InboundRequest {
        method: req.method().as_str().to_string(),
        query: req.query_string().to_string(),
        content_type: req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        body,
    };

    let response =
        controller::call::call(req.path(), request, &dispatcher).await?;

    let status =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut builder = HttpResponse::build(status);
    if let Some(content_type) = response.content_type {
        builder.insert_header((header::CONTENT_TYPE, content_type));
    }
    Ok(builder.body(response.body))
}

pub async fn method_not_allowed() -> HttpResponse {
    HttpResponse::MethodNotAllowed()
        .content_type(ContentType::plaintext())
        .body("Method not allowed\n")
}

pub async fn health() -> HttpResponse { HttpResponse::Ok().finish() }

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/serverless/")
            .route(web::post().to(post_function))
            .default_service(web::to(method_not_allowed)),
    )
    .route("/serverless/{name}", web::delete().to(delete_function))
    .route("/call/{tail:.*}", web::to(call))
    .route("/functions", web::get().to(get_functions))
    .route("/health", web::get().to(health));
}
