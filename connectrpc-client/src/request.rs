//! Request input for a call.

/// The request side of a call: one message, or a sequence of messages.
///
/// A single message sent to a streaming method is treated as a one-element
/// sequence.
///
/// ```
/// use connectrpc_client::Input;
///
/// let one: Input<u32> = 7.into();
/// assert_eq!(one.into_messages(), [7]);
///
/// let many = Input::stream([1, 2, 3]);
/// assert_eq!(many.len(), 3);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Input<T> {
    Message(T),
    Stream(Vec<T>),
}

impl<T> Input<T> {
    pub fn stream<I>(messages: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        Input::Stream(messages.into_iter().collect())
    }

    pub fn len(&self) -> usize {
        match self {
            Input::Message(_) => 1,
            Input::Stream(messages) => messages.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_messages(self) -> Vec<T> {
        match self {
            Input::Message(message) => vec![message],
            Input::Stream(messages) => messages,
        }
    }

    /// The single message, if there is exactly one.
    pub fn into_single(self) -> Option<T> {
        match self {
            Input::Message(message) => Some(message),
            Input::Stream(mut messages) if messages.len() == 1 => messages.pop(),
            Input::Stream(_) => None,
        }
    }
}

impl<T> From<T> for Input<T> {
    fn from(message: T) -> Self {
        Input::Message(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_message() {
        let input = Input::from("hi");
        assert_eq!(input.len(), 1);
        assert_eq!(input.clone().into_single(), Some("hi"));
        assert_eq!(input.into_messages(), ["hi"]);
    }

    #[test]
    fn test_stream_preserves_order() {
        let input = Input::stream(vec!["a", "b", "c"]);
        assert_eq!(input.clone().into_messages(), ["a", "b", "c"]);
        assert_eq!(input.into_single(), None);

        assert_eq!(Input::stream(["only"]).into_single(), Some("only"));
        assert!(Input::<u8>::stream([]).is_empty());
    }
}
