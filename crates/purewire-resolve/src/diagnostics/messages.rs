//! Typed diagnostic messages and their localized renderings.

use purewire_common::types::Culture;

use super::DiagnosticId;

/// What went wrong, with the names needed to explain it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Message {
    /// A contract nothing can satisfy.
    UnableToResolve {
        /// Unresolved contract.
        contract: String,
        /// Binding or root that requested it.
        consumer: String,
    },
    /// An all-eager cycle.
    CyclicDependency {
        /// Contracts on the cycle, closing contract last.
        path: String,
    },
    /// A long-lived node eagerly captures a narrower one.
    LifetimeDefect {
        /// Capturing binding.
        consumer: String,
        /// Its lifetime.
        consumer_lifetime: String,
        /// Captured binding.
        dependency: String,
        /// Its lifetime.
        dependency_lifetime: String,
    },
    /// A static root eagerly reaches something that needs an instance.
    StaticRootDefect {
        /// Root name.
        root: String,
        /// Unavailable dependency.
        dependency: String,
        /// Why it is unavailable.
        requirement: String,
    },
    /// A scoped node captures a scoped node of another scope.
    CrossScopeCapture {
        /// Capturing binding.
        consumer: String,
        /// Its scope.
        consumer_scope: String,
        /// Captured binding.
        dependency: String,
        /// Its scope.
        dependency_scope: String,
    },
    /// A factory variable whose type cannot be pinned down.
    TypeCannotBeInferred {
        /// Local variable.
        variable: String,
        /// Owning binding.
        binding: String,
    },
    /// An asynchronous factory.
    AsyncFactoryNotSupported {
        /// Owning binding.
        binding: String,
    },
    /// Setups depending on each other.
    DependsOnCycle {
        /// Setup names on the cycle.
        path: String,
    },
    /// A `depends_on` naming an unknown setup.
    SetupNotFound {
        /// Missing setup.
        setup: String,
        /// Setup that referenced it.
        dependent: String,
    },
    /// A root clashing with another root.
    DuplicateRoot {
        /// Root name or contract.
        root: String,
    },
    /// An external argument with a generic type.
    GenericArgument {
        /// Argument name.
        argument: String,
        /// Its type.
        ty: String,
    },
    /// An implementation missing one of its contracts.
    NotImplementedContract {
        /// Implementation type.
        implementation: String,
        /// Contract type it does not implement.
        contract: String,
    },
    /// A shadowed binding nothing uses.
    BindingNotUsed {
        /// The binding.
        binding: String,
    },
    /// A binding overriding earlier ones.
    OverriddenBinding {
        /// Overridden contracts.
        contract: String,
        /// The overriding binding.
        binding: String,
    },
    /// An active binding no root reaches.
    MetadataDefect {
        /// The binding.
        binding: String,
    },
    /// A factory injection the factory body never reads.
    InjectionSiteNotUsed {
        /// Local variable.
        variable: String,
        /// Owning binding.
        binding: String,
    },
    /// An instance member inherited from a base setup.
    InstanceMemberInDependsOnSetup {
        /// Member name.
        member: String,
        /// Setup declaring it.
        setup: String,
        /// Composition inheriting it.
        dependent: String,
    },
    /// A generic root excluded from resolve methods.
    TypeArgInResolveMethod {
        /// Root name or contract.
        root: String,
        /// Root type.
        ty: String,
    },
}

impl Message {
    /// Stable id of this message.
    #[must_use]
    pub const fn id(&self) -> DiagnosticId {
        match self {
            Self::UnableToResolve { .. } => DiagnosticId::ErrorUnableToResolve,
            Self::CyclicDependency { .. } => DiagnosticId::ErrorCyclicDependency,
            Self::LifetimeDefect { .. }
            | Self::StaticRootDefect { .. }
            | Self::CrossScopeCapture { .. } => DiagnosticId::ErrorLifetimeDefect,
            Self::TypeCannotBeInferred { .. } => DiagnosticId::ErrorTypeCannotBeInferred,
            Self::AsyncFactoryNotSupported { .. } => DiagnosticId::ErrorAsyncFactoryNotSupported,
            Self::DependsOnCycle { .. } => DiagnosticId::ErrorDependsOnCycle,
            Self::SetupNotFound { .. } => DiagnosticId::ErrorSetupNotFound,
            Self::DuplicateRoot { .. } => DiagnosticId::ErrorDuplicateRoot,
            Self::GenericArgument { .. } => DiagnosticId::ErrorGenericArgument,
            Self::NotImplementedContract { .. } => DiagnosticId::ErrorNotImplementedContract,
            Self::BindingNotUsed { .. } => DiagnosticId::WarningBindingNotUsed,
            Self::OverriddenBinding { .. } => DiagnosticId::WarningOverriddenBinding,
            Self::MetadataDefect { .. } => DiagnosticId::WarningMetadataDefect,
            Self::InjectionSiteNotUsed { .. } => DiagnosticId::WarningInjectionSiteNotUsed,
            Self::InstanceMemberInDependsOnSetup { .. } => {
                DiagnosticId::WarningInstanceMemberInDependsOnSetup
            }
            Self::TypeArgInResolveMethod { .. } => DiagnosticId::WarningTypeArgInResolveMethod,
        }
    }

    /// Renders the message in `culture`.
    #[must_use]
    pub fn render(&self, culture: Culture) -> String {
        match culture {
            Culture::En => self.render_en(),
            Culture::Ru => self.render_ru(),
        }
    }

    fn render_en(&self) -> String {
        match self {
            Self::UnableToResolve { contract, consumer } => {
                format!("Unable to resolve \"{contract}\" in {consumer}.")
            }
            Self::CyclicDependency { path } => {
                format!("Cyclic dependency has been found: {path}.")
            }
            Self::LifetimeDefect {
                consumer,
                consumer_lifetime,
                dependency,
                dependency_lifetime,
            } => format!(
                "{consumer} with lifetime {consumer_lifetime} cannot eagerly depend on {dependency} with lifetime {dependency_lifetime}."
            ),
            Self::StaticRootDefect {
                root,
                dependency,
                requirement,
            } => format!(
                "Static root {root} cannot eagerly depend on {dependency}: {requirement} is not available yet."
            ),
            Self::CrossScopeCapture {
                consumer,
                consumer_scope,
                dependency,
                dependency_scope,
            } => format!(
                "{consumer} in scope {consumer_scope} cannot eagerly depend on {dependency} in scope {dependency_scope}."
            ),
            Self::TypeCannotBeInferred { variable, binding } => {
                format!("The type of \"{variable}\" in {binding} cannot be inferred.")
            }
            Self::AsyncFactoryNotSupported { binding } => {
                format!("Asynchronous factory of {binding} is not supported.")
            }
            Self::DependsOnCycle { path } => {
                format!("Setups depend on each other: {path}.")
            }
            Self::SetupNotFound { setup, dependent } => {
                format!("Setup \"{setup}\" required by \"{dependent}\" was not found.")
            }
            Self::DuplicateRoot { root } => format!("Root {root} is declared more than once."),
            Self::GenericArgument { argument, ty } => format!(
                "Argument \"{argument}\" of type {ty} cannot use a generic type marker."
            ),
            Self::NotImplementedContract {
                implementation,
                contract,
            } => format!("{implementation} does not implement {contract}."),
            Self::BindingNotUsed { binding } => format!("The binding {binding} is not used."),
            Self::OverriddenBinding { contract, binding } => {
                format!("The binding {binding} overrides an earlier binding for {contract}.")
            }
            Self::MetadataDefect { binding } => {
                format!("The binding {binding} is not reachable from any root.")
            }
            Self::InjectionSiteNotUsed { variable, binding } => format!(
                "The injected variable \"{variable}\" is never used by the factory of {binding}."
            ),
            Self::InstanceMemberInDependsOnSetup {
                member,
                setup,
                dependent,
            } => format!(
                "Instance member \"{member}\" of setup \"{setup}\" is re-created in \"{dependent}\" instead of being shared."
            ),
            Self::TypeArgInResolveMethod { root, ty } => format!(
                "Root {root} of type {ty} uses a generic type marker and is not available through Resolve methods."
            ),
        }
    }

    fn render_ru(&self) -> String {
        match self {
            Self::UnableToResolve { contract, consumer } => {
                format!("Невозможно разрешить \"{contract}\" в {consumer}.")
            }
            Self::CyclicDependency { path } => {
                format!("Обнаружена циклическая зависимость: {path}.")
            }
            Self::LifetimeDefect {
                consumer,
                consumer_lifetime,
                dependency,
                dependency_lifetime,
            } => format!(
                "{consumer} со временем жизни {consumer_lifetime} не может напрямую зависеть от {dependency} со временем жизни {dependency_lifetime}."
            ),
            Self::StaticRootDefect {
                root,
                dependency,
                requirement,
            } => format!(
                "Статический корень {root} не может напрямую зависеть от {dependency}: {requirement} ещё не доступен."
            ),
            Self::CrossScopeCapture {
                consumer,
                consumer_scope,
                dependency,
                dependency_scope,
            } => format!(
                "{consumer} в области {consumer_scope} не может напрямую зависеть от {dependency} в области {dependency_scope}."
            ),
            Self::TypeCannotBeInferred { variable, binding } => {
                format!("Невозможно вывести тип \"{variable}\" в {binding}.")
            }
            Self::AsyncFactoryNotSupported { binding } => {
                format!("Асинхронная фабрика {binding} не поддерживается.")
            }
            Self::DependsOnCycle { path } => {
                format!("Настройки зависят друг от друга: {path}.")
            }
            Self::SetupNotFound { setup, dependent } => {
                format!("Настройка \"{setup}\", требуемая \"{dependent}\", не найдена.")
            }
            Self::DuplicateRoot { root } => format!("Корень {root} объявлен более одного раза."),
            Self::GenericArgument { argument, ty } => format!(
                "Аргумент \"{argument}\" типа {ty} не может использовать маркер обобщённого типа."
            ),
            Self::NotImplementedContract {
                implementation,
                contract,
            } => format!("{implementation} не реализует {contract}."),
            Self::BindingNotUsed { binding } => format!("Привязка {binding} не используется."),
            Self::OverriddenBinding { contract, binding } => {
                format!("Привязка {binding} переопределяет предыдущую привязку для {contract}.")
            }
            Self::MetadataDefect { binding } => {
                format!("Привязка {binding} недостижима ни из одного корня.")
            }
            Self::InjectionSiteNotUsed { variable, binding } => format!(
                "Внедрённая переменная \"{variable}\" не используется фабрикой {binding}."
            ),
            Self::InstanceMemberInDependsOnSetup {
                member,
                setup,
                dependent,
            } => format!(
                "Член экземпляра \"{member}\" настройки \"{setup}\" создаётся заново в \"{dependent}\"."
            ),
            Self::TypeArgInResolveMethod { root, ty } => format!(
                "Корень {root} типа {ty} использует маркер обобщённого типа и недоступен через методы Resolve."
            ),
        }
    }
}
