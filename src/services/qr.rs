/// QRコード画像レンダラー（外部サービス）
///
/// 任意の文字列を受け取り、その文字列をエンコードしたQR画像のURLを返す。
/// 外部サービスへの通信は行わず、URLの組み立てのみ。
#[derive(Clone)]
pub struct QrRenderer {
    base_url: String,
}

impl QrRenderer {
    /// # Arguments
    /// * `base_url` - 末尾にURIエンコード済みデータを連結するベースURL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub fn render(&self, data: &str) -> String {
        format!("{}{}", self.base_url, urlencoding::encode(data))
    }
}
