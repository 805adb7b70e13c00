/*
 * Responsibility
 * - middleware の公開インターフェース
 * - http: 横断的な transport 関心事 / auth: bearer 検証 → AuthCtx
 */
pub mod auth;
pub mod http;
