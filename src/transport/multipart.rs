use bytes::Bytes;
use reqwest::multipart::{Form, Part};

/// One file inside a multipart payload.
#[derive(Debug, Clone)]
pub struct FilePart {
    /// File name reported to the server
    pub file_name: String,
    /// MIME type of the content
    pub content_type: String,
    /// Raw file bytes
    pub data: Bytes,
}

impl FilePart {
    /// Create a file part.
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }
}

/// Multipart form content: named file parts plus plain text fields.
///
/// Field naming follows the server contract: a single file uploads under
/// `file`, a list uploads as `<field>[0]`, `<field>[1]`, and so on.
#[derive(Debug, Clone, Default)]
pub struct MultipartPayload {
    files: Vec<(String, FilePart)>,
    fields: Vec<(String, String)>,
}

impl MultipartPayload {
    /// Payload carrying one file under the `file` field.
    pub fn single(file: FilePart) -> Self {
        Self {
            files: vec![("file".to_string(), file)],
            fields: Vec::new(),
        }
    }

    /// Payload carrying several files under `<field>[<index>]` names.
    pub fn list(field: &str, files: Vec<FilePart>) -> Self {
        Self {
            files: files
                .into_iter()
                .enumerate()
                .map(|(index, file)| (format!("{}[{}]", field, index), file))
                .collect(),
            fields: Vec::new(),
        }
    }

    /// Attach a plain text field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Named file parts in upload order.
    pub fn files(&self) -> &[(String, FilePart)] {
        &self.files
    }

    /// Plain text fields in upload order.
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Convert into a reqwest form; reqwest generates the boundary.
    pub(crate) fn into_form(self) -> Form {
        let mut form = Form::new();
        for (name, file) in self.files {
            let part = Part::bytes(file.data.to_vec())
                .file_name(file.file_name.clone())
                .mime_str(&file.content_type)
                .unwrap_or_else(|_| {
                    Part::bytes(file.data.to_vec()).file_name(file.file_name.clone())
                });
            form = form.part(name, part);
        }
        for (name, value) in self.fields {
            form = form.text(name, value);
        }
        form
    }
}
