//! Static invokers standing in for instance methods.
//!
//! A [`SynthesizedInvoker`] behaves like the handwritten function
//!
//! ```ignore
//! fn invoke(instance: Arc<T>, p1: A1, ..., pn: An) -> R {
//!     instance.method(p1, ..., pn)
//! }
//! ```
//!
//! and, once registered, like the axum handler
//! `|Inject(instance): Inject<T>, p1: A1, ..., pn: An| instance.method(p1, ..., pn)`.

use crate::di::{HasContainer, Inject};
use crate::endpoint::descriptor::InvokerSignature;
use crate::endpoint::registry::DelegateShape;
use axum::extract::{FromRequest, FromRequestParts};
use axum::response::IntoResponse;
use axum::routing::{self, MethodFilter, MethodRouter};
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

/// A callable that runs a method of `T` given the instance and the argument
/// tuple `Args`.
///
/// Implemented for every `Fn(Arc<T>, A1, ..., An) -> R` up to twelve
/// arguments; `#[endpoints]` generates one such function per method.
pub trait InstanceMethod<T, Args>: Clone + Send + Sync + 'static {
    type Output;

    /// Number of forwarded arguments.
    const ARITY: usize;

    fn call(&self, instance: Arc<T>, args: Args) -> Self::Output;
}

macro_rules! count {
    () => { 0 };
    ($head:ident $($tail:ident)*) => { 1 + count!($($tail)*) };
}

macro_rules! impl_instance_method {
    ($($ty:ident),*) => {
        #[allow(non_snake_case)]
        impl<T, F, R, $($ty,)*> InstanceMethod<T, ($($ty,)*)> for F
        where
            F: Fn(Arc<T>, $($ty,)*) -> R + Clone + Send + Sync + 'static,
        {
            type Output = R;

            const ARITY: usize = count!($($ty)*);

            fn call(&self, instance: Arc<T>, ($($ty,)*): ($($ty,)*)) -> R {
                (self)(instance, $($ty,)*)
            }
        }
    };
}

impl_instance_method!();
impl_instance_method!(A1);
impl_instance_method!(A1, A2);
impl_instance_method!(A1, A2, A3);
impl_instance_method!(A1, A2, A3, A4);
impl_instance_method!(A1, A2, A3, A4, A5);
impl_instance_method!(A1, A2, A3, A4, A5, A6);
impl_instance_method!(A1, A2, A3, A4, A5, A6, A7);
impl_instance_method!(A1, A2, A3, A4, A5, A6, A7, A8);
impl_instance_method!(A1, A2, A3, A4, A5, A6, A7, A8, A9);
impl_instance_method!(A1, A2, A3, A4, A5, A6, A7, A8, A9, A10);
impl_instance_method!(A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11);
impl_instance_method!(A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11, A12);

/// A static callable generated for one instance method.
///
/// Created by [`InvokerRegistry::create_invoker`]; immutable afterwards and
/// cheap to clone.
///
/// [`InvokerRegistry::create_invoker`]: crate::endpoint::InvokerRegistry::create_invoker
pub struct SynthesizedInvoker<T, F, Args> {
    signature: Arc<InvokerSignature>,
    delegate: Arc<DelegateShape>,
    method: F,
    _marker: PhantomData<fn(Arc<T>, Args)>,
}

impl<T, F, Args> SynthesizedInvoker<T, F, Args> {
    pub(crate) fn new(
        signature: Arc<InvokerSignature>,
        delegate: Arc<DelegateShape>,
        method: F,
    ) -> Self {
        Self {
            signature,
            delegate,
            method,
            _marker: PhantomData,
        }
    }

    /// The generated name, e.g. `MyEndpoint_handle_async_Invoker`.
    pub fn name(&self) -> &str {
        &self.signature.name
    }

    pub fn signature(&self) -> &Arc<InvokerSignature> {
        &self.signature
    }

    pub fn delegate(&self) -> &Arc<DelegateShape> {
        &self.delegate
    }

    /// Run the target method on `instance`, returning its result untouched.
    pub fn invoke(&self, instance: Arc<T>, args: Args) -> <F as InstanceMethod<T, Args>>::Output
    where
        F: InstanceMethod<T, Args>,
    {
        self.method.call(instance, args)
    }
}

impl<T, F: Clone, Args> Clone for SynthesizedInvoker<T, F, Args> {
    fn clone(&self) -> Self {
        Self {
            signature: Arc::clone(&self.signature),
            delegate: Arc::clone(&self.delegate),
            method: self.method.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T, F, Args> fmt::Debug for SynthesizedInvoker<T, F, Args> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynthesizedInvoker")
            .field("name", &self.signature.name)
            .field("parameters", &self.signature.parameters.len())
            .finish()
    }
}

/// Turns an invoker into an axum [`MethodRouter`] whose first extractor
/// resolves the instance from the container.
///
/// `M` is the extractor marker axum uses to tell body-consuming last
/// arguments apart from `FromRequestParts` ones; it is always inferred.
pub trait IntoMethodRouter<S, M> {
    fn into_method_router(self, filter: MethodFilter) -> MethodRouter<S>;
}

impl<T, F, Res, S> IntoMethodRouter<S, ()> for SynthesizedInvoker<T, F, ()>
where
    T: Send + Sync + 'static,
    F: InstanceMethod<T, ()>,
    F::Output: Future<Output = Res> + Send,
    Res: IntoResponse,
    S: HasContainer + Clone + Send + Sync + 'static,
{
    fn into_method_router(self, filter: MethodFilter) -> MethodRouter<S> {
        let method = self.method;
        routing::on(filter, move |Inject(instance): Inject<T>| method.call(instance, ()))
    }
}

macro_rules! impl_into_method_router {
    ([$($ty:ident),*], $last:ident) => {
        #[allow(non_snake_case)]
        impl<T, F, Res, S, M, $($ty,)* $last> IntoMethodRouter<S, (M, $($ty,)* $last,)>
            for SynthesizedInvoker<T, F, ($($ty,)* $last,)>
        where
            T: Send + Sync + 'static,
            F: InstanceMethod<T, ($($ty,)* $last,)>,
            F::Output: Future<Output = Res> + Send,
            Res: IntoResponse,
            S: HasContainer + Clone + Send + Sync + 'static,
            M: 'static,
            $($ty: FromRequestParts<S> + Send + 'static,)*
            $last: FromRequest<S, M> + Send + 'static,
        {
            fn into_method_router(self, filter: MethodFilter) -> MethodRouter<S> {
                let method = self.method;
                routing::on(
                    filter,
                    move |Inject(instance): Inject<T>, $($ty: $ty,)* $last: $last| {
                        method.call(instance, ($($ty,)* $last,))
                    },
                )
            }
        }
    };
}

impl_into_method_router!([], A1);
impl_into_method_router!([A1], A2);
impl_into_method_router!([A1, A2], A3);
impl_into_method_router!([A1, A2, A3], A4);
impl_into_method_router!([A1, A2, A3, A4], A5);
impl_into_method_router!([A1, A2, A3, A4, A5], A6);
impl_into_method_router!([A1, A2, A3, A4, A5, A6], A7);
impl_into_method_router!([A1, A2, A3, A4, A5, A6, A7], A8);
impl_into_method_router!([A1, A2, A3, A4, A5, A6, A7, A8], A9);
impl_into_method_router!([A1, A2, A3, A4, A5, A6, A7, A8, A9], A10);
impl_into_method_router!([A1, A2, A3, A4, A5, A6, A7, A8, A9, A10], A11);
impl_into_method_router!([A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11], A12);
