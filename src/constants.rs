// Environment-derived configuration. Everything here has a sane default so
// the binary starts without a .env; the API key and OAuth credentials are
// the only values that genuinely must be provided.

use std::env;

lazy_static::lazy_static! {
    pub static ref OPENAI_API_URL: String = env::var("OPENAI_API_URL")
        .unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".to_string());
    pub static ref OPENAI_MODEL: String =
        env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-3.5-turbo".to_string());
    pub static ref OPENAI_API_KEY: String = env::var("OPENAI_API_KEY").unwrap_or_default();

    pub static ref GITHUB_API_URL: String =
        env::var("GITHUB_API_URL").unwrap_or_else(|_| "https://api.github.com".to_string());
    pub static ref GITHUB_OAUTH_URL: String = env::var("GITHUB_OAUTH_URL")
        .unwrap_or_else(|_| "https://github.com/login".to_string());
    pub static ref GITHUB_CLIENT_ID: String = env::var("GITHUB_CLIENT_ID").unwrap_or_default();
    pub static ref GITHUB_CLIENT_SECRET: String =
        env::var("GITHUB_CLIENT_SECRET").unwrap_or_default();
    pub static ref GITHUB_REDIRECT_URI: String = env::var("GITHUB_REDIRECT_URI")
        .unwrap_or_else(|_| "http://localhost:8700/auth/github/callback".to_string());
}

/// Instructions sent as the system message on every generation request. The
/// extractor's primary path depends on the model honoring these fences.
pub const SYSTEM_PROMPT: &str = "You are a web development expert. Generate HTML, CSS, and JavaScript code based on the user's request.\n\
Format your response with code blocks using markdown syntax:\n\
```html\n\
[HTML code here]\n\
```\n\
```css\n\
[CSS code here]\n\
```\n\
```javascript\n\
[JavaScript code here]\n\
```";
