//! `GET /` — plain-text usage instructions.

use crate::{handlers::object_handlers::public_base_url, state::AppState};
use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
};

const EXAMPLE_ID: &str = "2c8000bc-7c10-4700-9cc3-eb0dce0a9d1a";

pub async fn usage(State(state): State<AppState>, headers: HeaderMap) -> Response {
    // Without any host to go on, show the links relative to the server root.
    let base_url = public_base_url(&state, &headers).unwrap_or_default();
    let text = usage_text(&base_url, state.store.max_size());

    let mut response = text.into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

fn usage_text(base_url: &str, max_size: usize) -> String {
    let index = format!("{}/", base_url);
    let example = format!("{}/{}", base_url, EXAMPLE_ID);
    format!(
        "\
YODO - You Only Download Once
=============================

YODO is an ephemeral file hosting service.

There are two ways to upload a file (say, image.png):

    $ curl --header 'Content-Type: image/png' --data-binary @image.png {index}
    $ curl --form 'file=@image.png;type=image/png' {index}

The former sends the file content as the request body and names its type
in the Content-Type header; there is no way to provide a filename. The
latter is a multipart/form-data request where the content is uploaded
through the 'file' part; both Content-Type and filename may be given this
way. application/x-www-form-urlencoded requests are not allowed.

There is an upload size limit of {max_size} bytes.

The response is HTTP 201 with the URL of the newly uploaded file, e.g.,

    $ curl --form 'file=@image.png;type=image/png' {index}
    {example}

The URL is available for download exactly once; the file is destroyed
after the first GET request (but not HEAD). Content-Type, if not given at
upload time, is guessed from the filename. The Content-Disposition header
is present if a filename was given at upload time.

    $ curl --head {example}
    HTTP/1.1 200 OK
    content-type: image/png
    content-length: 25715
    content-disposition: attachment; filename=\"image.png\"
"
    )
}
