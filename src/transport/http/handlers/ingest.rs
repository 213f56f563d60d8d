//! `POST /`: layer creation.
//!
//! JSON bodies define a view over an existing relation. Multipart bodies carry a
//! shapefile, either as a zip archive or as separate component files; which of the two
//! is decided by the set of submitted field names alone.

use crate::app::layer_service::ShapefileUpload;
use crate::domain::model::Layer;
use crate::domain::shapefile::ShapefileComponents;
use crate::domain::upload::{self, UploadMethod};
use crate::domain::view::LayerConfiguration;
use crate::transport::http::handlers::common::SubmittedForm;
use crate::transport::http::problem::Problem;
use crate::transport::http::types::AppState;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::{header, StatusCode};
use axum::Json;

#[utoipa::path(
    post,
    path = "/",
    request_body(
        content = LayerConfiguration,
        description = "View definition as JSON, or a multipart shapefile upload \
                       (archive or shp/shx/dbf/prj[/cpg] plus layer-name, record-name-field, record-key-field)"
    ),
    responses(
        (status = 201, description = "Layer created", body = Layer),
        (status = 400, description = "Invalid or ambiguous submission", body = Problem),
        (status = 404, description = "View source relation does not exist", body = Problem),
        (status = 409, description = "Layer or relation already exists", body = Problem),
        (status = 415, description = "Unsupported content type", body = Problem)
    )
)]
pub async fn create_layer_handler(
    State(state): State<AppState>,
    request: Request,
) -> crate::Result<(StatusCode, Json<Layer>)> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let layer = match upload::classify_content_type(&content_type)? {
        Some(UploadMethod::ViewDefinition) => {
            let Json(configuration) = Json::<LayerConfiguration>::from_request(request, &state).await?;
            state.layers.create_view_layer(configuration).await?
        }
        _ => {
            let multipart = Multipart::from_request(request, &state)
                .await
                .map_err(|e| crate::Error::InvalidForm(e.body_text()))?;
            let form = SubmittedForm::collect(multipart).await?;
            let method = upload::classify(form.field_names())?;
            tracing::debug!(?method, "layer upload classified");
            let upload = shapefile_upload(form, method, state.layers.max_extracted_bytes())?;
            state.layers.ingest_shapefile(upload).await?
        }
    };
    Ok((StatusCode::CREATED, Json(layer)))
}

fn shapefile_upload(
    mut form: SubmittedForm,
    method: UploadMethod,
    max_extracted_bytes: u64,
) -> crate::Result<ShapefileUpload> {
    let layer = form.layer_metadata()?;
    let record_name_field = form.require_text(upload::RECORD_NAME_FIELD)?;
    let record_key_field = form.require_text(upload::RECORD_KEY_FIELD)?;
    let additional_properties = form.texts(upload::ADDITIONAL_PROPERTY);

    let components = match method {
        UploadMethod::ArchiveUpload => {
            let archive = form.require_file(upload::ARCHIVE)?;
            ShapefileComponents::from_archive(&archive, max_extracted_bytes)?
        }
        UploadMethod::DirectUpload => ShapefileComponents {
            shp: form.require_file(upload::GEOMETRY_FILE)?,
            shx: form.require_file(upload::INDEX_FILE)?,
            dbf: form.require_file(upload::ATTRIBUTE_FILE)?,
            prj: form.take_file(upload::PROJECTION_FILE),
            cpg: form.take_file(upload::CODE_PAGE_FILE),
        },
        UploadMethod::ViewDefinition => return Err(crate::Error::NoUploadMethodDetected),
    };

    Ok(ShapefileUpload {
        layer,
        record_name_field,
        record_key_field,
        additional_properties,
        components,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::shapefile::fixtures::{points, PointFeature};

    fn direct_form() -> SubmittedForm {
        let components = points(&[PointFeature { x: 1.0, y: 2.0, name: "A", key: "a" }]);
        let prj = components.prj.clone().unwrap_or_default();
        SubmittedForm::from_parts(&[
            (upload::LAYER_NAME, &b"Wells"[..]),
            (upload::RECORD_NAME_FIELD, &b"NAME"[..]),
            (upload::RECORD_KEY_FIELD, &b"KEY"[..]),
            (upload::ADDITIONAL_PROPERTY, &b"DEPTH"[..]),
            (upload::GEOMETRY_FILE, components.shp.as_slice()),
            (upload::INDEX_FILE, components.shx.as_slice()),
            (upload::ATTRIBUTE_FILE, components.dbf.as_slice()),
            (upload::PROJECTION_FILE, prj.as_slice()),
        ])
    }

    #[test]
    fn direct_uploads_map_every_component() {
        let form = direct_form();
        let method = upload::classify(form.field_names()).unwrap();
        assert_eq!(method, UploadMethod::DirectUpload);

        let upload = shapefile_upload(form, method, 1 << 20).unwrap();
        assert_eq!(upload.layer.name, "Wells");
        assert_eq!(upload.record_key_field, "KEY");
        assert_eq!(upload.additional_properties, vec!["DEPTH"]);
        assert!(upload.components.prj.is_some());
        assert!(upload.components.cpg.is_none());
        assert_eq!(upload.components.shx.len(), 108);
    }
}
