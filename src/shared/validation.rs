use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// クライアント側・サーバー側いずれかで入力が拒否された理由。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ValidationFailureKind {
    /// 汎用的なバリデーションエラー。
    Generic,
    /// 本文も添付も空の投稿。
    EmptyContent,
    /// 本文が上限文字数を超過。
    ContentTooLarge,
    /// サーバー側のコンテンツフィルタによる拒否。
    ContentRejected,
    /// ロール不足など権限による拒否。
    PermissionDenied,
    /// 確定前（仮 ID）のレコードに対する操作。
    ProvisionalRecord,
}

impl ValidationFailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationFailureKind::Generic => "generic",
            ValidationFailureKind::EmptyContent => "empty_content",
            ValidationFailureKind::ContentTooLarge => "content_too_large",
            ValidationFailureKind::ContentRejected => "content_rejected",
            ValidationFailureKind::PermissionDenied => "permission_denied",
            ValidationFailureKind::ProvisionalRecord => "provisional_record",
        }
    }
}

impl fmt::Display for ValidationFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidationFailureKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generic" => Ok(ValidationFailureKind::Generic),
            "empty_content" => Ok(ValidationFailureKind::EmptyContent),
            "content_too_large" => Ok(ValidationFailureKind::ContentTooLarge),
            "content_rejected" => Ok(ValidationFailureKind::ContentRejected),
            "permission_denied" => Ok(ValidationFailureKind::PermissionDenied),
            "provisional_record" => Ok(ValidationFailureKind::ProvisionalRecord),
            _ => Err(()),
        }
    }
}
