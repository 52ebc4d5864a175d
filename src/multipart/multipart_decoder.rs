use http::header::CONTENT_TYPE;
use log::trace;

use crate::error::fixture_error::FixtureServerError;
use crate::error::fixture_error_enums::MultipartError;
use crate::http::request_response::fixture_request::FixtureRequest;

/// One section of a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartField {
    pub name: Option<String>,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub content: String,
}

/// Extracts the `boundary` parameter from a `Content-Type` header value.
pub fn boundary_from_content_type(content_type: &str) -> Result<String, MultipartError> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| unquote(value.trim()).to_string())
        .filter(|boundary| !boundary.is_empty())
        .ok_or(MultipartError::MissingBoundary)
}

/// Splits `body` on `--boundary` and decodes every part in source order.
pub fn decode(body: &[u8], boundary: &str) -> Result<Vec<MultipartField>, MultipartError> {
    let text = String::from_utf8_lossy(body);
    let delimiter = format!("--{}", boundary);

    let mut fields = Vec::new();
    for (index, segment) in text.split(delimiter.as_str()).enumerate() {
        // Preamble, epilogue and the closing "--" carry no field
        if segment.trim().is_empty() || segment.starts_with("--") {
            continue;
        }

        let part = segment.strip_prefix("\r\n").or_else(|| segment.strip_prefix('\n')).unwrap_or(segment);
        let (headers, content) = split_headers(part).ok_or(MultipartError::MissingSeparator(index))?;
        fields.push(parse_part(headers, content));
    }

    trace!("Decoded {} multipart fields", fields.len());
    Ok(fields)
}

/// Decodes the body of a captured request using the boundary from its `Content-Type`.
pub fn decode_request(request: &FixtureRequest) -> Result<Vec<MultipartField>, FixtureServerError> {
    let content_type = request.header(CONTENT_TYPE.as_str()).ok_or(MultipartError::MissingBoundary)?;
    let boundary = boundary_from_content_type(content_type)?;
    Ok(decode(request.body(), &boundary)?)
}

fn split_headers(part: &str) -> Option<(&str, &str)> {
    // A part may carry no headers at all, leaving only the blank line
    if let Some(content) = part.strip_prefix("\r\n").or_else(|| part.strip_prefix('\n')) {
        return Some(("", content));
    }
    part.split_once("\r\n\r\n").or_else(|| part.split_once("\n\n"))
}

fn parse_part(headers: &str, content: &str) -> MultipartField {
    let mut field = MultipartField {
        name: None,
        filename: None,
        content_type: None,
        content: content.strip_suffix("\r\n").or_else(|| content.strip_suffix('\n')).unwrap_or(content).to_string(),
    };

    for line in headers.lines() {
        let Some((header_name, value)) = line.split_once(':') else {
            continue;
        };
        let header_name = header_name.trim();
        if header_name.eq_ignore_ascii_case("content-disposition") {
            for param in value.split(';').skip(1) {
                let Some((key, param_value)) = param.split_once('=') else {
                    continue;
                };
                let param_value = unquote(param_value.trim()).to_string();
                match key.trim().to_ascii_lowercase().as_str() {
                    "name" => field.name = Some(param_value),
                    "filename" => field.filename = Some(param_value),
                    _ => {}
                }
            }
        } else if header_name.eq_ignore_ascii_case("content-type") {
            field.content_type = Some(value.trim().to_string());
        }
    }

    field
}

fn unquote(value: &str) -> &str {
    value.strip_prefix('"').and_then(|v| v.strip_suffix('"')).unwrap_or(value)
}
