use std::path::PathBuf;

use structopt::StructOpt;

/// Default cap on a single multipart upload, in bytes.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "digit-server",
    about = "Classify handwritten digit images over HTTP",
    usage = "digit-server <model-path> [OPTIONS]"
)]
pub struct Opt {
    /// Path to the ONNX model, reloaded on every request
    #[structopt(parse(from_os_str))]
    pub model_path: PathBuf,
    /// Address to bind
    #[structopt(long, default_value = "127.0.0.1")]
    pub host: String,
    /// Port to serve on
    #[structopt(short, long, default_value = "5000")]
    pub port: u16,
    /// Largest accepted upload in bytes
    #[structopt(long, default_value = "10485760")]
    pub max_upload_bytes: usize,
}

impl Opt {
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn settings(&self) -> Settings {
        Settings {
            model_path: self.model_path.clone(),
            max_upload_bytes: self.max_upload_bytes,
        }
    }
}

/// Process-wide, read-only state handed to every request.
#[derive(Debug, Clone)]
pub struct Settings {
    pub model_path: PathBuf,
    pub max_upload_bytes: usize,
}

impl Settings {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_path_is_the_only_required_argument() {
        let opt = Opt::from_iter_safe(["digit-server", "model.onnx"]).unwrap();
        assert_eq!(opt.model_path, PathBuf::from("model.onnx"));
        assert_eq!(opt.endpoint(), "127.0.0.1:5000");
        assert_eq!(opt.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[test]
    fn usage_leads_with_model_path() {
        let mut help = Vec::new();
        Opt::clap().write_help(&mut help).unwrap();
        let help = String::from_utf8(help).unwrap();
        assert!(help.contains("digit-server <model-path> [OPTIONS]"), "{help}");
    }

    #[test]
    fn wrong_argument_count_is_rejected() {
        assert!(Opt::from_iter_safe(["digit-server"]).is_err());
        assert!(Opt::from_iter_safe(["digit-server", "a.onnx", "b.onnx"]).is_err());
    }

    #[test]
    fn flags_override_defaults() {
        let opt = Opt::from_iter_safe([
            "digit-server",
            "--port",
            "8080",
            "--host",
            "0.0.0.0",
            "--max-upload-bytes",
            "1024",
            "/models/mnist.onnx",
        ])
        .unwrap();
        assert_eq!(opt.endpoint(), "0.0.0.0:8080");
        let settings = opt.settings();
        assert_eq!(settings.model_path, PathBuf::from("/models/mnist.onnx"));
        assert_eq!(settings.max_upload_bytes, 1024);
    }
}
