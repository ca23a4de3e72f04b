// Credits to Shepmaster on stackoverflow.com for this idea.
// It needed a small syntax correction though.
/// This macro allows you to create an enum which automatically implements TryFrom and Into for an integer type.
///
/// Signed discriminants are fine, `int_enum!(pub enum Sign: i8 { Minus = -1, Plus = 1 })` works as expected.
#[macro_export]
macro_rules! int_enum {
	($(#[$meta:meta])* $vis:vis enum $name:ident: $int:ty {
		$($(#[$vmeta:meta])* $vname:ident $(= $val:expr)?),*
	}) => {
		$(#[$meta])*
		#[repr($int)]
		$vis enum $name {
			$($(#[$vmeta])* $vname $(= $val)?,)*
		}

		impl std::convert::TryFrom<$int> for $name {
			type Error = $int;

			/// Gives back the rejected integer if it is not one of the variants.
			fn try_from(v: $int) -> Result<Self, Self::Error> {
				match v {
					$(x if x == Self::$vname as $int => Ok(Self::$vname),)*
					other => Err(other),
				}
			}
		}

		impl From<$name> for $int {
			fn from( value: $name ) -> $int {
				value as $int
			}
		}
	}
}
