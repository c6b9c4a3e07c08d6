//! Order state machines
//!
//! Fulfillment and payment are two independent sub-states of an order.
//! Every change goes through one of the transition functions here; handlers
//! never assign a status directly.

use crate::db::models::{OrderStatus, PaymentStatus};
use shared::error::{AppError, ErrorCode};

/// Outcome of a legal transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition<S> {
    /// Move to the new state
    To(S),
    /// Already there, nothing to write
    Unchanged,
}

// ============================================================================
// Fulfillment
// ============================================================================

impl OrderStatus {
    /// Delivered and cancelled orders never move again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Position along `pending → processing → shipped → delivered`
    fn rank(&self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Processing => Some(1),
            Self::Shipped => Some(2),
            Self::Delivered => Some(3),
            Self::Cancelled => None,
        }
    }
}

/// Fulfillment transition
///
/// Forward moves may skip steps; `cancelled` is reachable from any
/// non-terminal state; backward moves and moves out of a terminal state fail.
pub fn fulfillment_transition(
    from: OrderStatus,
    to: OrderStatus,
) -> Result<Transition<OrderStatus>, AppError> {
    if from == to {
        return Ok(Transition::Unchanged);
    }
    if from.is_terminal() {
        return Err(invalid_fulfillment(from, to));
    }
    match (from.rank(), to.rank()) {
        (_, None) => Ok(Transition::To(to)),
        (Some(current), Some(target)) if target > current => Ok(Transition::To(to)),
        _ => Err(invalid_fulfillment(from, to)),
    }
}

fn invalid_fulfillment(from: OrderStatus, to: OrderStatus) -> AppError {
    AppError::with_message(
        ErrorCode::InvalidStatusTransition,
        format!(
            "Cannot change order status from '{}' to '{}'",
            from.as_str(),
            to.as_str()
        ),
    )
}

// ============================================================================
// Payment
// ============================================================================

/// What is being done to the payment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentAction {
    /// Owner (or admin) attached a bank-transfer receipt
    UploadReceipt,
    /// Admin accepted the receipt
    Verify,
    /// Admin refused the receipt
    Reject,
    /// Admin override, any status
    Set(PaymentStatus),
}

impl PaymentAction {
    fn name(&self) -> &'static str {
        match self {
            Self::UploadReceipt => "upload a receipt",
            Self::Verify => "verify",
            Self::Reject => "reject",
            Self::Set(_) => "set",
        }
    }
}

/// Payment transition
pub fn payment_transition(
    from: PaymentStatus,
    action: PaymentAction,
) -> Result<PaymentStatus, AppError> {
    use PaymentStatus::*;

    match (action, from) {
        (PaymentAction::Set(target), _) => Ok(target),

        (_, Verified) if action != PaymentAction::Reject => Err(AppError::with_message(
            ErrorCode::PaymentAlreadyVerified,
            "Payment has already been verified",
        )),

        (PaymentAction::UploadReceipt, Pending | PendingVerification | Rejected) => {
            Ok(PendingVerification)
        }
        (PaymentAction::Verify, PendingVerification) => Ok(Verified),
        (PaymentAction::Reject, PendingVerification | Verified) => Ok(Rejected),

        (action, from) => Err(AppError::with_message(
            ErrorCode::InvalidPaymentTransition,
            format!(
                "Cannot {} a payment in status '{}'",
                action.name(),
                from.as_str()
            ),
        )),
    }
}

/// `is_paid` and `paid_at` implied by a payment status
///
/// A verified payment keeps its original `paid_at` when one is already set.
pub fn paid_fields(status: PaymentStatus, paid_at: Option<i64>, now: i64) -> (bool, Option<i64>) {
    match status {
        PaymentStatus::Verified => (true, Some(paid_at.unwrap_or(now))),
        _ => (false, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus as O;
    use PaymentStatus as P;

    #[test]
    fn test_forward_moves_allowed() {
        assert_eq!(
            fulfillment_transition(O::Pending, O::Processing).unwrap(),
            Transition::To(O::Processing)
        );
        assert_eq!(
            fulfillment_transition(O::Pending, O::Shipped).unwrap(),
            Transition::To(O::Shipped)
        );
        assert_eq!(
            fulfillment_transition(O::Shipped, O::Delivered).unwrap(),
            Transition::To(O::Delivered)
        );
    }

    #[test]
    fn test_cancel_from_non_terminal_only() {
        for from in [O::Pending, O::Processing, O::Shipped] {
            assert_eq!(
                fulfillment_transition(from, O::Cancelled).unwrap(),
                Transition::To(O::Cancelled)
            );
        }
        let err = fulfillment_transition(O::Delivered, O::Cancelled).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStatusTransition);
    }

    #[test]
    fn test_backward_and_terminal_rejected() {
        assert!(fulfillment_transition(O::Shipped, O::Processing).is_err());
        assert!(fulfillment_transition(O::Processing, O::Pending).is_err());
        assert!(fulfillment_transition(O::Cancelled, O::Pending).is_err());
        assert!(fulfillment_transition(O::Delivered, O::Shipped).is_err());
    }

    #[test]
    fn test_same_state_is_noop() {
        assert_eq!(
            fulfillment_transition(O::Delivered, O::Delivered).unwrap(),
            Transition::Unchanged
        );
    }

    #[test]
    fn test_receipt_upload() {
        for from in [P::Pending, P::PendingVerification, P::Rejected] {
            assert_eq!(
                payment_transition(from, PaymentAction::UploadReceipt).unwrap(),
                P::PendingVerification
            );
        }
        let err = payment_transition(P::Verified, PaymentAction::UploadReceipt).unwrap_err();
        assert_eq!(err.code, ErrorCode::PaymentAlreadyVerified);
    }

    #[test]
    fn test_verify_requires_pending_verification() {
        assert_eq!(
            payment_transition(P::PendingVerification, PaymentAction::Verify).unwrap(),
            P::Verified
        );
        assert_eq!(
            payment_transition(P::Pending, PaymentAction::Verify)
                .unwrap_err()
                .code,
            ErrorCode::InvalidPaymentTransition
        );
        assert_eq!(
            payment_transition(P::Verified, PaymentAction::Verify)
                .unwrap_err()
                .code,
            ErrorCode::PaymentAlreadyVerified
        );
    }

    #[test]
    fn test_reject() {
        assert_eq!(
            payment_transition(P::PendingVerification, PaymentAction::Reject).unwrap(),
            P::Rejected
        );
        assert_eq!(
            payment_transition(P::Verified, PaymentAction::Reject).unwrap(),
            P::Rejected
        );
        assert!(payment_transition(P::Rejected, PaymentAction::Reject).is_err());
        assert!(payment_transition(P::Pending, PaymentAction::Reject).is_err());
    }

    #[test]
    fn test_direct_set_is_permissive() {
        for from in [P::Pending, P::PendingVerification, P::Verified, P::Rejected] {
            for to in [P::Pending, P::PendingVerification, P::Verified, P::Rejected] {
                assert_eq!(payment_transition(from, PaymentAction::Set(to)).unwrap(), to);
            }
        }
    }

    #[test]
    fn test_paid_fields_follow_status() {
        assert_eq!(paid_fields(P::Verified, None, 7), (true, Some(7)));
        assert_eq!(paid_fields(P::Verified, Some(3), 7), (true, Some(3)));
        assert_eq!(paid_fields(P::Rejected, Some(3), 7), (false, None));
        assert_eq!(paid_fields(P::Pending, None, 7), (false, None));
        assert_eq!(paid_fields(P::PendingVerification, Some(3), 7), (false, None));
    }
}
