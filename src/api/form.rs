use axum::extract::Multipart;

use crate::error::AppError;
use crate::narration::GenerationRequest;

#[derive(Debug, Default)]
pub struct NarrationForm {
    pub text: Option<String>,
    pub file: Option<UploadedFile>,
    pub tone: Option<String>,
    pub voice: Option<String>,
}

#[derive(Debug)]
pub struct UploadedFile {
    pub file_name: String,
    pub data: Vec<u8>,
}

impl NarrationForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "text_input" => form.text = Some(field.text().await?),
                "file_input" => {
                    let file_name = field.file_name().map(str::to_string);
                    let data = field.bytes().await?;
                    // Browsers send an empty, nameless part when no file was picked.
                    if let Some(file_name) = file_name.filter(|n| !n.is_empty()) {
                        form.file = Some(UploadedFile {
                            file_name,
                            data: data.to_vec(),
                        });
                    }
                }
                "tone" => form.tone = Some(field.text().await?),
                "voice" => form.voice = Some(field.text().await?),
                other => tracing::debug!(field = other, "Ignoring unknown form field"),
            }
        }

        Ok(form)
    }

    /// An uploaded file wins over the text area.
    pub fn into_request(self) -> Result<GenerationRequest, AppError> {
        let text = match self.file {
            Some(file) => file_text(file)?,
            None => self.text.unwrap_or_default().trim().to_string(),
        };

        Ok(GenerationRequest {
            text,
            tone: parse_or_default(self.tone)?,
            voice: parse_or_default(self.voice)?,
        })
    }
}

fn file_text(file: UploadedFile) -> Result<String, AppError> {
    if !file.file_name.to_ascii_lowercase().ends_with(".txt") {
        return Err(AppError::validation(format!(
            "'{}' is not a .txt file",
            file.file_name
        )));
    }

    let text = String::from_utf8(file.data)
        .map_err(|_| AppError::validation(format!("'{}' is not valid UTF-8", file.file_name)))?;

    const BOM: char = '\u{feff}';
    if text.starts_with(BOM) {
        Ok(text[BOM.len_utf8()..].to_string())
    } else {
        Ok(text)
    }
}

fn parse_or_default<T>(value: Option<String>) -> Result<T, AppError>
where
    T: std::str::FromStr<Err = AppError> + Default,
{
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v.parse(),
        _ => Ok(T::default()),
    }
}
