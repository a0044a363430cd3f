//! Multipart request body assembly.

use crate::file::File;

/// A `multipart/form-data` body builder.
///
/// Discord wants uploaded files as `file_0`, `file_1`, … fields, with an
/// optional `payload_json` field carrying the rest of the request body when
/// both files and a JSON body are present.
pub(crate) struct Form {
    boundary: String,
    buffer: Vec<u8>,
}

impl Form {
    pub(crate) fn new() -> Self {
        let boundary: String = std::iter::repeat_with(fastrand::alphanumeric)
            .take(24)
            .collect();

        Self {
            boundary,
            buffer: Vec::new(),
        }
    }

    pub(crate) fn file(&mut self, index: usize, file: &File<'_>) {
        self.write_part_header(&format!("file_{index}"), Some(file.filename()), None);
        self.buffer.extend_from_slice(file.data());
        self.buffer.extend_from_slice(b"\r\n");
    }

    pub(crate) fn payload_json(&mut self, json: &[u8]) {
        self.write_part_header("payload_json", None, Some("application/json"));
        self.buffer.extend_from_slice(json);
        self.buffer.extend_from_slice(b"\r\n");
    }

    fn write_part_header(&mut self, name: &str, filename: Option<&str>, content_type: Option<&str>) {
        self.buffer.extend_from_slice(b"--");
        self.buffer.extend_from_slice(self.boundary.as_bytes());
        self.buffer.extend_from_slice(b"\r\nContent-Disposition: form-data; name=\"");
        self.buffer.extend_from_slice(name.as_bytes());
        self.buffer.extend_from_slice(b"\"");

        if let Some(filename) = filename {
            self.buffer.extend_from_slice(b"; filename=\"");
            self.buffer.extend_from_slice(filename.as_bytes());
            self.buffer.extend_from_slice(b"\"");
        }

        self.buffer.extend_from_slice(b"\r\n");

        if let Some(content_type) = content_type {
            self.buffer.extend_from_slice(b"Content-Type: ");
            self.buffer.extend_from_slice(content_type.as_bytes());
            self.buffer.extend_from_slice(b"\r\n");
        }

        self.buffer.extend_from_slice(b"\r\n");
    }

    /// Finish the body, returning the `Content-Type` header value and the
    /// encoded bytes.
    pub(crate) fn build(mut self) -> (String, Vec<u8>) {
        self.buffer.extend_from_slice(b"--");
        self.buffer.extend_from_slice(self.boundary.as_bytes());
        self.buffer.extend_from_slice(b"--\r\n");

        (
            format!("multipart/form-data; boundary={}", self.boundary),
            self.buffer,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::Form;
    use crate::file::File;

    #[test]
    fn files_and_payload_json_are_both_present() {
        let mut form = Form::new();
        form.file(0, &File::from_bytes("a.txt", b"hello"));
        form.payload_json(br#"{"content":"hi"}"#);

        let (content_type, body) = form.build();
        let body = String::from_utf8(body).unwrap();

        assert!(content_type.starts_with("multipart/form-data; boundary="));
        assert!(body.contains("name=\"file_0\""));
        assert!(body.contains("filename=\"a.txt\""));
        assert!(body.contains("name=\"payload_json\""));
        assert!(body.contains("hello"));
    }
}
