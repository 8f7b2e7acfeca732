//! Completion state of one fetched input.

/// State of an input dataset for the current fetch generation.
///
/// `Pending` and `Unavailable` are different on purpose: a fallback may
/// only settle on its neutral default once the auxiliary fetch has
/// finished, either with data or with a non-fatal failure.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Input<T> {
    #[default]
    Pending,
    Ready(T),
    /// The fetch finished without data (non-fatal failure).
    Unavailable,
}

impl<T> Input<T> {
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    #[must_use]
    pub fn ready(&self) -> Option<&T> {
        match self {
            Self::Ready(value) => Some(value),
            Self::Pending | Self::Unavailable => None,
        }
    }

    pub fn as_ref(&self) -> Input<&T> {
        match self {
            Self::Pending => Input::Pending,
            Self::Ready(value) => Input::Ready(value),
            Self::Unavailable => Input::Unavailable,
        }
    }
}

impl<T: std::ops::Deref> Input<T> {
    /// Borrows the ready payload through its `Deref` target, e.g.
    /// `Input<Vec<T>>` to `Input<&[T]>`.
    pub fn as_deref(&self) -> Input<&T::Target> {
        match self {
            Self::Pending => Input::Pending,
            Self::Ready(value) => Input::Ready(&**value),
            Self::Unavailable => Input::Unavailable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_is_not_settled() {
        assert!(!Input::<u8>::Pending.is_settled());
        assert!(Input::<u8>::Unavailable.is_settled());
        assert!(Input::Ready(1).is_settled());
    }

    #[test]
    fn as_deref_borrows_vec_as_slice() {
        let input = Input::Ready(vec![1, 2, 3]);
        let borrowed: Input<&[i32]> = input.as_deref();
        assert_eq!(borrowed.ready().map(|s| s.len()), Some(3));
    }
}
