use std::path::PathBuf;

/// Lower/upper bound for the brush diameter in canvas pixels.
pub const BRUSH_SIZE_MIN: f32 = 5.0;
pub const BRUSH_SIZE_MAX: f32 = 500.0;
/// Hard cap on zoom; settings can only lower it.
pub const ZOOM_LIMIT: f32 = 5.0;
/// Hard cap on attached reference images.
pub const REFERENCE_LIMIT: usize = 5;

/// Editor settings that persist across sessions.
#[derive(Clone, Debug, PartialEq)]
pub struct EditorSettings {
    /// Default brush diameter (canvas pixels, 5–500).
    pub brush_size: f32,
    /// Diameter of the resize/delete handles in canvas pixels at zoom 1.
    pub handle_size: f32,
    /// Maximum zoom factor (1–5).
    pub max_zoom: f32,
    /// Maximum number of reference images (1–5).
    pub max_reference_images: usize,
    /// Folder where the file-drop backend writes submissions.
    pub output_dir: PathBuf,
    /// Remaining generation credits; Edit Mode requires at least one.
    pub credits: u32,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            brush_size: 40.0,
            handle_size: 20.0,
            max_zoom: ZOOM_LIMIT,
            max_reference_images: REFERENCE_LIMIT,
            output_dir: PathBuf::from("astra_submissions"),
            credits: 10,
        }
    }
}

impl EditorSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/astra/astra_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\Astra\astra_settings.cfg
    /// On macOS:   ~/Library/Application Support/Astra/astra_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").ok()?;
            return Some(PathBuf::from(appdata).join("Astra").join("astra_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("Astra")
                    .join("astra_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
                .ok()?;
            Some(config_dir.join("astra").join("astra_settings.cfg"))
        }
    }

    /// Serialize to the `key=value` config format.
    pub fn to_config_string(&self) -> String {
        format!(
            "brush_size={}\n\
             handle_size={}\n\
             max_zoom={}\n\
             max_reference_images={}\n\
             output_dir={}\n\
             credits={}\n",
            self.brush_size,
            self.handle_size,
            self.max_zoom,
            self.max_reference_images,
            self.output_dir.display(),
            self.credits,
        )
    }

    /// Parse the `key=value` format.  Unknown keys and unparsable values are
    /// ignored; every numeric value is clamped into its legal range.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "brush_size" => {
                    if let Ok(v) = val.parse::<f32>() {
                        s.brush_size = v;
                    }
                }
                "handle_size" => {
                    if let Ok(v) = val.parse::<f32>() {
                        s.handle_size = v;
                    }
                }
                "max_zoom" => {
                    if let Ok(v) = val.parse::<f32>() {
                        s.max_zoom = v;
                    }
                }
                "max_reference_images" => {
                    if let Ok(v) = val.parse::<usize>() {
                        s.max_reference_images = v;
                    }
                }
                "output_dir" => {
                    if !val.is_empty() {
                        s.output_dir = PathBuf::from(val);
                    }
                }
                "credits" => {
                    if let Ok(v) = val.parse::<u32>() {
                        s.credits = v;
                    }
                }
                _ => {}
            }
        }
        s.sanitize();
        s
    }

    fn sanitize(&mut self) {
        if !self.brush_size.is_finite() {
            self.brush_size = Self::default().brush_size;
        }
        self.brush_size = self.brush_size.clamp(BRUSH_SIZE_MIN, BRUSH_SIZE_MAX);
        if !self.handle_size.is_finite() || self.handle_size <= 0.0 {
            self.handle_size = Self::default().handle_size;
        }
        if !self.max_zoom.is_finite() {
            self.max_zoom = ZOOM_LIMIT;
        }
        self.max_zoom = self.max_zoom.clamp(1.0, ZOOM_LIMIT);
        self.max_reference_images = self.max_reference_images.clamp(1, REFERENCE_LIMIT);
    }

    /// Load settings from disk (defaults if the file is missing or corrupt).
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        match std::fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    /// Save settings to disk.
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = std::fs::write(&path, self.to_config_string()) {
            crate::log_warn!("Failed to save settings to {}: {}", path.display(), e);
        }
    }
}
