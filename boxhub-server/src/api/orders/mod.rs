//! Order API 模块
//!
//! | 路径 | 方法 | 说明 | 权限 |
//! |------|------|------|------|
//! | /api/orders | POST | 下单 | 已验证用户 |
//! | /api/orders | GET | 全部订单 | 管理员 |
//! | /api/orders/myorders | GET | 我的订单 | 用户 |
//! | /api/orders/{id} | GET | 订单详情 | 本人/管理员 |
//! | /api/orders/{id}/status | PUT | 履约状态 | 管理员 |
//! | /api/orders/{id}/payment | PUT | 直接设置支付状态 | 管理员 |
//! | /api/orders/{id}/tracking | PUT | 物流单号 | 管理员 |
//! | /api/orders/{id}/receipt | POST/GET | 上传/下载转账凭证 | 本人/管理员 |
//! | /api/orders/{id}/invoice | GET | PDF 发票 | 本人/管理员 |
//! | /api/orders/{id} | DELETE | 删除订单 | 管理员 |

mod handler;

use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};

use crate::auth::require_admin;
use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/orders", routes())
}

fn routes() -> Router<ServerState> {
    let customer = Router::new()
        .route("/", post(handler::place))
        .route("/myorders", get(handler::my_orders))
        .route("/{id}", get(handler::get_by_id))
        .route(
            "/{id}/receipt",
            post(handler::upload_receipt).get(handler::download_receipt),
        )
        .route("/{id}/invoice", get(handler::invoice));

    let admin = Router::new()
        .route("/", get(handler::list))
        .route("/{id}", delete(handler::delete))
        .route("/{id}/status", put(handler::update_status))
        .route("/{id}/payment", put(handler::update_payment))
        .route("/{id}/tracking", put(handler::set_tracking))
        .route_layer(middleware::from_fn(require_admin));

    customer.merge(admin)
}
